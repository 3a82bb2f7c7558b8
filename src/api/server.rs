use crate::api::{routes, AppState};
use crate::config::ServerConfig;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Starts and runs the HTTP server using Axum web framework
///
/// Serves until Ctrl-C (or SIGTERM on Unix) is received, then drains
/// in-flight requests.
///
/// # Arguments
/// * `config` - Listening address and CORS origins
/// * `state` - Shared handler state
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Ok once shut down, Error if binding or serving fails
pub async fn launch_server(
    config: &ServerConfig,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    let cors = routes::cors_layer(&config.frontend_origins)?;
    let app = routes::app(state, cors);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
