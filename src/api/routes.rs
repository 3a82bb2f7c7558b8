//! API routes configuration module

use crate::api::auth::require_user;
use crate::api::handlers::{
    get_analysis, get_stats, health, list_analyses, request_analysis, trading_health,
};
use crate::api::AppState;
use crate::config::ConfigError;
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderValue, Method};
use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Creates and configures the API router with all routes
///
/// # Arguments
/// * `state` - Shared state handed to every handler
/// * `cors` - CORS policy wrapping every route
///
/// # Returns
/// * `Router` - Configured router; `/api/trading/*` requires a bearer token
pub fn app(state: AppState, cors: CorsLayer) -> Router {
    let trading = Router::new()
        .route("/analyze", post(request_analysis))
        .route("/analysis/:task_id", get(get_analysis))
        .route("/analyses", get(list_analyses))
        .route("/stats", get(get_stats))
        .route("/health", get(trading_health))
        .route_layer(middleware::from_fn(require_user));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/trading", trading)
        .layer(Extension(state))
        .layer(cors)
}

/// Builds the CORS policy for the configured frontend origins
///
/// A lone `*` allows every origin, in which case credentials are not allowed.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ORIGIN, CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([CONTENT_LENGTH])
        .max_age(Duration::from_secs(12 * 60 * 60));

    if origins.iter().any(|o| o == "*") {
        return Ok(base.allow_origin(Any));
    }

    let allowed = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| ConfigError::Invalid(format!("invalid frontend origin '{}'", origin)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(base
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true))
}
