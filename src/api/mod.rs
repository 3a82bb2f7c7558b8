/// Bearer token authentication middleware
pub mod auth;
/// API error types and handling
pub mod errors;
/// HTTP handlers for the trading endpoints
pub mod handlers;
/// Routes configuration and setup
pub mod routes;
/// HTTP server implementation
pub mod server;

use crate::core::AnalysisGateway;
use crate::db::Database;
use std::sync::Arc;

/// Shared state handed to every handler through an `Extension` layer
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub gateway: Arc<AnalysisGateway>,
}
