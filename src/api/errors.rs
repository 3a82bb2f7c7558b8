use crate::core::GatewayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;
use tracing::error;

/// Error returned by every endpoint as `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub code: u16,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiError({}, {})", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::Json(json!({ "error": self.message }));
        (status, body).into_response()
    }
}

/// Helper function to create API errors
pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    ApiError {
        message: message.to_string(),
        code: status.as_u16(),
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidInput(msg) => api_error(StatusCode::BAD_REQUEST, &msg),
            GatewayError::NotFound => api_error(StatusCode::NOT_FOUND, "task not found"),
            GatewayError::Provider(e) => api_error(StatusCode::BAD_GATEWAY, &e.to_string()),
            GatewayError::Store(e) => {
                error!("Store failure while serving request: {}", e);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}
