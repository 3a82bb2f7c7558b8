use clap::{Parser, Subcommand};

/// Command line interface for the trading gateway
#[derive(Parser)]
#[command(name = "trading-gateway", version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    /// Default: config/config.yaml when present, built-in defaults otherwise
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Overrides the logging filter from the configuration
    /// Possible values: "error", "warn", "info", "debug", "trace"
    #[arg(long, global = true)]
    pub logging_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Runs the HTTP gateway
    Serve,

    /// Registers a user and prints their bearer token
    CreateUser {
        #[arg(short, long)]
        username: String,
    },

    /// Submits an analysis to a running gateway
    Analyze {
        /// Stock symbol, e.g. NVDA
        #[arg(short, long)]
        ticker: String,

        /// Analysis date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// Polls until the analysis completes or fails
        #[arg(short, long)]
        wait: bool,

        /// Maximum number of polls when waiting
        #[arg(long)]
        max_attempts: Option<u32>,
    },
}
