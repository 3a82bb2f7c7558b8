//! Task lifecycle between the gateway's store and the analysis provider.
//!
//! Tasks are created by [`AnalysisGateway::submit`] and only ever advanced by
//! [`AnalysisGateway::reconcile`], which polls the provider while the task is
//! not terminal and becomes a pure read once it is.

use crate::constants::{MAX_TICKER_LEN, RECENT_TASKS_LIMIT};
use crate::core::decision::{DecisionAction, DecodedDecision};
use crate::core::task_locks::TaskLocks;
use crate::core::task_state::TaskStatus;
use crate::db::{AnalysisTask, Database, Decision, NewAnalysisTask, TaskRepository};
use crate::errors::Error;
use crate::provider::{AnalysisProvider, AnalysisRequest, ProviderEnvelope, ProviderError};
use chrono::{DateTime, Utc};
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("task not found")]
    NotFound,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("store error: {0}")]
    Store(#[from] Error),
}

/// A submit request as received from a client
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub llm_config: Option<Value>,
    #[serde(default)]
    pub data_vendor_config: Option<Value>,
}

/// A task together with its decision, if one has been recorded
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub task: AnalysisTask,
    pub decision: Option<Decision>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionCounts {
    pub buy: i64,
    pub sell: i64,
    pub hold: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub total_analyses: i64,
    pub completed: i64,
    pub failed: i64,
    /// Every task that is not terminal yet, `processing` included
    pub pending: i64,
    pub decisions: DecisionCounts,
}

/// Submits analyses to the provider and reconciles their local state.
pub struct AnalysisGateway {
    database: Database,
    provider: Arc<dyn AnalysisProvider>,
    locks: TaskLocks,
    max_consecutive_failures: u32,
}

impl AnalysisGateway {
    pub fn new(
        database: Database,
        provider: Arc<dyn AnalysisProvider>,
        max_consecutive_failures: u32,
    ) -> Self {
        AnalysisGateway {
            database,
            provider,
            locks: TaskLocks::new(),
            max_consecutive_failures: max_consecutive_failures.max(1),
        }
    }

    /// Submits a new analysis and records it for `user_id`.
    ///
    /// Nothing is stored unless the provider accepted the request and
    /// returned a task id.
    pub async fn submit(
        &self,
        user_id: i32,
        request: SubmitRequest,
    ) -> Result<AnalysisTask, GatewayError> {
        let ticker = request.ticker.trim().to_ascii_uppercase();
        let date = request.date.trim().to_string();
        if ticker.is_empty() || date.is_empty() {
            return Err(GatewayError::InvalidInput(
                "ticker and date are required".to_string(),
            ));
        }
        if ticker.chars().count() > MAX_TICKER_LEN {
            return Err(GatewayError::InvalidInput(format!(
                "ticker must be at most {} characters",
                MAX_TICKER_LEN
            )));
        }

        let config = serialize_config(&request)?;
        let provider_request = AnalysisRequest {
            ticker,
            date,
            llm_config: request.llm_config,
            data_vendor_config: request.data_vendor_config,
        };

        let envelope = self.provider.submit(&provider_request).await.map_err(|e| {
            warn!(
                "Trading service refused analysis of {} for user {}: {}",
                provider_request.ticker, user_id, e
            );
            e
        })?;
        if envelope.task_id.trim().is_empty() {
            return Err(ProviderError::Malformed(
                "trading service did not return a task_id".to_string(),
            )
            .into());
        }

        let (status, error) = initial_status(&envelope);
        let now = Utc::now().naive_utc();
        let mut conn = self.database.get_conn()?;
        let task = TaskRepository::new(&mut conn).insert_task(&NewAnalysisTask {
            user_id,
            task_id: envelope.task_id.trim(),
            ticker: &provider_request.ticker,
            analysis_date: &provider_request.date,
            status: status.as_str(),
            config: config.as_deref(),
            poll_failures: 0,
            created_at: now,
            updated_at: now,
        })?;
        let task = match error {
            Some(reason) => {
                let mut task = task;
                task.error = Some(reason);
                TaskRepository::new(&mut conn).save_task(&mut task)?;
                task
            }
            None => task,
        };

        info!(
            "Task {} created for user {} ({} {}) with status {}",
            task.task_id, user_id, task.ticker, task.analysis_date, task.status
        );
        Ok(task)
    }

    /// Refreshes a task owned by `user_id` from the provider.
    ///
    /// Terminal tasks are returned as stored without contacting the provider.
    /// Calls for the same task id are serialized.
    pub async fn reconcile(&self, task_id: &str, user_id: i32) -> Result<TaskRecord, GatewayError> {
        let _guard = self.locks.acquire(task_id).await;

        let mut task = {
            let mut conn = self.database.get_conn()?;
            TaskRepository::new(&mut conn)
                .find_owned_task(task_id, user_id)?
                .ok_or(GatewayError::NotFound)?
        };
        let current = task.status()?;
        if current.is_terminal() {
            return self.attach_decision(task);
        }

        let response = self.provider.status(task_id).await;
        let mut decoded = None;
        let unreachable = match response {
            Ok(envelope) => {
                task.poll_failures = 0;
                decoded = apply_envelope(&mut task, current, envelope);
                None
            }
            Err(err @ ProviderError::Unreachable(_)) => {
                task.poll_failures += 1;
                if task.poll_failures as u32 >= self.max_consecutive_failures {
                    warn!(
                        "Task {}: trading service unreachable {} times in a row, giving up: {}",
                        task_id, task.poll_failures, err
                    );
                    task.fail(err.to_string());
                } else {
                    warn!(
                        "Task {}: trading service unreachable ({}/{}): {}",
                        task_id, task.poll_failures, self.max_consecutive_failures, err
                    );
                }
                Some(err)
            }
            Err(err) => {
                task.poll_failures = 0;
                warn!("Task {}: trading service status check failed: {}", task_id, err);
                task.fail(err.to_string());
                None
            }
        };

        let decision = self.persist(&mut task, decoded.as_ref())?;
        if task.status != current.as_str() {
            info!(
                "Task {} for user {} moved {} -> {}",
                task_id, user_id, current, task.status
            );
        }

        match unreachable {
            Some(err) => Err(err.into()),
            None => Ok(TaskRecord { task, decision }),
        }
    }

    /// Saves the task and, for a fresh completion, its decision in one transaction.
    fn persist(
        &self,
        task: &mut AnalysisTask,
        decoded: Option<&DecodedDecision>,
    ) -> Result<Option<Decision>, GatewayError> {
        let mut pooled = self.database.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        let decision = conn
            .transaction::<_, Error, _>(|conn| {
                let mut repo = TaskRepository::new(conn);
                let decision = match decoded {
                    Some(decoded) => Some(repo.record_decision(&task.task_id, decoded)?),
                    None => repo.get_decision(&task.task_id)?,
                };
                repo.save_task(&mut *task)?;
                Ok(decision)
            })
            .map_err(|e| {
                error!("Failed to persist task {}: {}", task.task_id, e);
                e
            })?;
        Ok(decision)
    }

    fn attach_decision(&self, task: AnalysisTask) -> Result<TaskRecord, GatewayError> {
        let mut conn = self.database.get_conn()?;
        let decision = TaskRepository::new(&mut conn).get_decision(&task.task_id)?;
        Ok(TaskRecord { task, decision })
    }

    /// Lists the most recent tasks of `user_id` with their decisions.
    pub fn list_recent(&self, user_id: i32) -> Result<Vec<TaskRecord>, GatewayError> {
        let mut conn = self.database.get_conn()?;
        let mut repo = TaskRepository::new(&mut conn);
        let tasks = repo.list_recent_tasks(user_id, RECENT_TASKS_LIMIT)?;

        let ids: Vec<String> = tasks.iter().map(|t| t.task_id.clone()).collect();
        let mut decisions: HashMap<String, Decision> = repo
            .get_decisions(&ids)?
            .into_iter()
            .map(|d| (d.task_id.clone(), d))
            .collect();

        Ok(tasks
            .into_iter()
            .map(|task| {
                let decision = decisions.remove(&task.task_id);
                TaskRecord { task, decision }
            })
            .collect())
    }

    /// Aggregates task and decision counts for `user_id`.
    pub fn stats(&self, user_id: i32) -> Result<AnalysisStats, GatewayError> {
        let mut conn = self.database.get_conn()?;
        let mut repo = TaskRepository::new(&mut conn);

        let mut stats = AnalysisStats::default();
        for (status, count) in repo.count_tasks_by_status(user_id)? {
            stats.total_analyses += count;
            match status.parse::<TaskStatus>() {
                Ok(TaskStatus::Completed) => stats.completed += count,
                Ok(TaskStatus::Failed) => stats.failed += count,
                _ => {}
            }
        }
        stats.pending = stats.total_analyses - stats.completed - stats.failed;

        for (action, count) in repo.count_decisions_by_action(user_id)? {
            match action.parse::<DecisionAction>() {
                Ok(DecisionAction::Buy) => stats.decisions.buy += count,
                Ok(DecisionAction::Sell) => stats.decisions.sell += count,
                Ok(DecisionAction::Hold) => stats.decisions.hold += count,
                Err(_) => debug!("Ignoring decisions with unknown action {}", action),
            }
        }
        Ok(stats)
    }

    pub async fn provider_health(&self) -> Result<Value, ProviderError> {
        self.provider.health().await
    }
}

/// Serializes the optional provider settings into the task's config blob.
fn serialize_config(request: &SubmitRequest) -> Result<Option<String>, GatewayError> {
    let mut fields = Map::new();
    if let Some(llm) = &request.llm_config {
        fields.insert("llm_config".to_string(), llm.clone());
    }
    if let Some(vendor) = &request.data_vendor_config {
        fields.insert("data_vendor_config".to_string(), vendor.clone());
    }
    if fields.is_empty() {
        return Ok(None);
    }
    let blob = serde_json::to_string(&Value::Object(fields)).map_err(Error::from)?;
    Ok(Some(blob))
}

/// Status a freshly accepted task is stored with.
///
/// A provider that reports `completed` straight away is treated as still
/// `processing`, so that the next poll fetches and records the decision.
/// An unknown status is stored as `failed` so the accepted task id is kept.
fn initial_status(envelope: &ProviderEnvelope) -> (TaskStatus, Option<String>) {
    let reported = match envelope.status.as_deref().map(str::trim) {
        None | Some("") => return (TaskStatus::Pending, None),
        Some(raw) => match raw.parse::<TaskStatus>() {
            Ok(status) => status,
            Err(e) => {
                return (
                    TaskStatus::Failed,
                    Some(format!("trading service reported {}", e)),
                )
            }
        },
    };
    match reported {
        TaskStatus::Completed => (TaskStatus::Processing, None),
        TaskStatus::Failed => (
            TaskStatus::Failed,
            Some(provider_failure_reason(envelope)),
        ),
        other => (other, None),
    }
}

fn provider_failure_reason(envelope: &ProviderEnvelope) -> String {
    envelope
        .error
        .clone()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "trading service reported failure without an error message".to_string())
}

/// Applies a successful status response to `task`.
///
/// Returns the decision to record when the task has just completed.
fn apply_envelope(
    task: &mut AnalysisTask,
    current: TaskStatus,
    envelope: ProviderEnvelope,
) -> Option<DecodedDecision> {
    let reported = match envelope.status.as_deref().map(str::trim) {
        None | Some("") => return None,
        Some(raw) => match raw.parse::<TaskStatus>() {
            Ok(status) => status,
            Err(e) => {
                task.fail(format!("trading service reported {}", e));
                return None;
            }
        },
    };

    match reported {
        TaskStatus::Completed => {
            let Some(payload) = envelope.decision.as_ref() else {
                task.fail("trading service reported completion without a decision");
                return None;
            };
            match DecodedDecision::from_payload(payload, envelope.analysis_report.as_ref()) {
                Ok(decoded) => {
                    task.set_status(TaskStatus::Completed);
                    task.error = None;
                    task.completed_at = Some(parse_completed_at(envelope.completed_at.as_deref()));
                    task.processing_time_seconds = envelope.processing_time_seconds;
                    Some(decoded)
                }
                Err(e) => {
                    task.fail(format!("invalid decision from trading service: {}", e));
                    None
                }
            }
        }
        TaskStatus::Failed => {
            task.fail(provider_failure_reason(&envelope));
            None
        }
        other => {
            task.set_status(current.advance(other));
            None
        }
    }
}

fn parse_completed_at(raw: Option<&str>) -> chrono::NaiveDateTime {
    raw.and_then(|value| match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(at) => Some(at.with_timezone(&Utc).naive_utc()),
        Err(e) => {
            debug!("Unparseable completed_at '{}': {}", value, e);
            None
        }
    })
    .unwrap_or_else(|| Utc::now().naive_utc())
}
