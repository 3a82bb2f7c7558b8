use crate::api::errors::{api_error, ApiError};
use crate::api::AppState;
use crate::core::credentials::{bearer_token, hash_token};
use crate::db::UserRepository;
use axum::extract::{Extension, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, error};

/// Identity resolved from the request's bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
}

/// Rejects requests without a valid bearer token and exposes the caller as [`AuthUser`].
pub async fn require_user(
    Extension(state): Extension<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token_hash = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(hash_token)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    let user = {
        let mut conn = state.database.get_conn().map_err(|e| {
            error!("Failed to get connection for authentication: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        })?;
        UserRepository::new(&mut conn)
            .find_by_token_hash(&token_hash)
            .map_err(|e| {
                error!("Failed to look up bearer token: {}", e);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            })?
    };

    let Some(user) = user else {
        debug!("Rejected request with unknown bearer token");
        return Err(api_error(StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
    });
    Ok(next.run(request).await)
}
