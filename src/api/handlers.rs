use crate::api::auth::AuthUser;
use crate::api::errors::{api_error, ApiError};
use crate::api::AppState;
use crate::core::{AnalysisStats, SubmitRequest, TaskRecord};
use crate::db::{AnalysisTask, Decision};
use crate::provider::ProviderError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// Task information returned by the API endpoints
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: i32,
    pub user_id: i32,
    pub task_id: String,
    pub ticker: String,
    pub analysis_date: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionView>,
}

/// Decision information embedded in a [`TaskView`]
#[derive(Debug, Serialize)]
pub struct DecisionView {
    pub id: i32,
    pub task_id: String,
    pub action: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_size: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_report: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_decision: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TaskList {
    pub tasks: Vec<TaskView>,
    pub total: usize,
}

fn utc(at: NaiveDateTime) -> DateTime<Utc> {
    at.and_utc()
}

/// Stored JSON columns go back out as JSON; anything else as a plain string.
fn stored_json(raw: Option<String>) -> Option<Value> {
    raw.map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

impl From<Decision> for DecisionView {
    fn from(decision: Decision) -> Self {
        DecisionView {
            id: decision.id,
            task_id: decision.task_id,
            action: decision.action,
            confidence: decision.confidence,
            position_size: decision.position_size,
            analysis_report: stored_json(decision.analysis_report),
            raw_decision: stored_json(decision.raw_decision),
            created_at: utc(decision.created_at),
        }
    }
}

impl TaskView {
    fn new(task: AnalysisTask, decision: Option<Decision>) -> Self {
        TaskView {
            id: task.id,
            user_id: task.user_id,
            task_id: task.task_id,
            ticker: task.ticker,
            analysis_date: task.analysis_date,
            status: task.status,
            config: stored_json(task.config),
            completed_at: task.completed_at.map(utc),
            processing_time_seconds: task.processing_time_seconds,
            error: task.error,
            created_at: utc(task.created_at),
            updated_at: utc(task.updated_at),
            decision: decision.map(DecisionView::from),
        }
    }
}

impl From<TaskRecord> for TaskView {
    fn from(record: TaskRecord) -> Self {
        TaskView::new(record.task, record.decision)
    }
}

/// Unauthenticated liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}

/// Submits a new trading analysis for the caller
#[axum::debug_handler]
pub async fn request_analysis(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskView>), ApiError> {
    let Json(request) =
        payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.body_text()))?;
    debug!("User {} requests analysis of {}", user.username, request.ticker);

    let task = state.gateway.submit(user.id, request).await?;
    Ok((StatusCode::ACCEPTED, Json(TaskView::new(task, None))))
}

/// Returns a task, refreshing it from the trading service while it is in flight
#[axum::debug_handler]
pub async fn get_analysis(
    Path(task_id): Path<String>,
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TaskView>, ApiError> {
    let record = state.gateway.reconcile(&task_id, user.id).await?;
    Ok(Json(record.into()))
}

/// Lists the caller's most recent tasks
#[axum::debug_handler]
pub async fn list_analyses(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TaskList>, ApiError> {
    let tasks: Vec<TaskView> = state
        .gateway
        .list_recent(user.id)?
        .into_iter()
        .map(TaskView::from)
        .collect();
    Ok(Json(TaskList {
        total: tasks.len(),
        tasks,
    }))
}

/// Aggregate counts over the caller's tasks and decisions
#[axum::debug_handler]
pub async fn get_stats(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AnalysisStats>, ApiError> {
    Ok(Json(state.gateway.stats(user.id)?))
}

/// Proxies the trading service health check
#[axum::debug_handler]
pub async fn trading_health(Extension(state): Extension<AppState>) -> Response {
    match state.gateway.provider_health().await {
        Ok(payload) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "trading_service": payload,
            })),
        )
            .into_response(),
        Err(err) => {
            let message = match err {
                ProviderError::Unreachable(reason) => {
                    format!("trading service is down: {}", reason)
                }
                other => other.to_string(),
            };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "message": message,
                })),
            )
                .into_response()
        }
    }
}
