//! Main entry point for the trading gateway.
//!
//! Loads environment variables and configuration, initializes logging and
//! dispatches to one of the subcommands:
//! - `serve` runs the HTTP API in front of the trading analysis service
//! - `create-user` registers an API user and prints their token
//! - `analyze` submits an analysis to a running gateway, optionally waiting for it

mod api;
mod cli;
mod client;
mod config;
mod constants;
mod core;
mod db;
mod errors;
mod provider;
mod schema;
mod utils;

use clap::Parser;
use cli::{Cli, Command};
use colored::Colorize;
use config::GatewayConfig;
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let dotenv = dotenvy::dotenv();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Invalid configuration:".red(), e);
            std::process::exit(2);
        }
    };

    let level = cli
        .logging_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    utils::init_logging(&level, config.logging.directory.as_deref());

    if let Err(e) = dotenv {
        warn!("Failed to load .env file: {}", e);
    }

    let outcome = match cli.command {
        Command::Serve => serve(config).await,
        Command::CreateUser { username } => create_user(&config, &username),
        Command::Analyze {
            ticker,
            date,
            wait,
            max_attempts,
        } => analyze(&config, &ticker, &date, wait, max_attempts).await,
    };

    if let Err(e) = outcome {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn open_database(config: &GatewayConfig) -> Result<db::Database, Box<dyn Error>> {
    let database = db::Database::new(&config.database.path, config.database.max_connections)?;
    database.migrate()?;
    Ok(database)
}

async fn serve(config: GatewayConfig) -> Result<(), Box<dyn Error>> {
    let database = open_database(&config)?;
    let provider = provider::HttpProvider::from_config(&config.provider)?;
    info!(
        "Forwarding analyses to {}{}",
        config.provider.base_url, config.provider.api_prefix
    );

    let gateway = core::AnalysisGateway::new(
        database.clone(),
        Arc::new(provider),
        config.reconcile.max_consecutive_failures,
    );
    let state = api::AppState {
        database,
        gateway: Arc::new(gateway),
    };

    api::server::launch_server(&config.server, state).await
}

fn create_user(config: &GatewayConfig, username: &str) -> Result<(), Box<dyn Error>> {
    let username = username.trim();
    if username.is_empty() {
        return Err("username must not be empty".into());
    }

    let database = open_database(config)?;
    let token = core::credentials::generate_token();
    let mut conn = database.get_conn()?;
    let user = db::UserRepository::new(&mut conn)
        .create_user(username, &core::credentials::hash_token(&token))?;

    println!("{} {} (id {})", "Created user".green(), user.username.bold(), user.id);
    println!("{} {}", "Token:".bold(), token);
    println!("{}", "The token is shown only once; store it now.".yellow());
    Ok(())
}

async fn analyze(
    config: &GatewayConfig,
    ticker: &str,
    date: &str,
    wait: bool,
    max_attempts: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let token = config
        .client
        .token
        .as_deref()
        .ok_or("no gateway token configured; set GATEWAY_TOKEN or client.token")?;
    let gateway = client::GatewayClient::new(&config.client.gateway_url, token)?;

    let task = gateway.submit(ticker, date).await?;
    println!(
        "{} {} for {} ({})",
        "Submitted".green(),
        task.task_id.bold(),
        task.ticker,
        task.status
    );
    if !wait || task.is_terminal() {
        return print_task(&task);
    }

    let max_attempts = max_attempts.unwrap_or(config.client.max_attempts).max(1);
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = gateway
        .wait_for(
            &task.task_id,
            config.client.poll_interval,
            max_attempts,
            |attempt, polled| {
                let status = polled.map_or("unreachable", |t| t.status.as_str());
                spinner.set_message(format!("poll {}/{}: {}", attempt, max_attempts, status));
            },
        )
        .await;
    spinner.finish_and_clear();

    print_task(&result?)
}

fn print_task(task: &client::TaskSummary) -> Result<(), Box<dyn Error>> {
    match task.status.as_str() {
        "completed" => {
            println!("{} {}", task.ticker.bold(), "completed".green());
            if let Some(decision) = &task.decision {
                println!(
                    "  decision: {} (confidence {:.2})",
                    decision.action.bold(),
                    decision.confidence
                );
            }
            if let Some(seconds) = task.processing_time_seconds {
                println!("  took {:.1}s", seconds);
            }
            Ok(())
        }
        "failed" => {
            let reason = task.error.as_deref().unwrap_or("no reason given");
            println!("{} {}: {}", task.ticker.bold(), "failed".red(), reason);
            Err(format!("analysis {} failed", task.task_id).into())
        }
        other => {
            println!("{} is {}", task.ticker.bold(), other.yellow());
            Ok(())
        }
    }
}
