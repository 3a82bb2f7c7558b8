use super::{AnalysisProvider, AnalysisRequest, ProviderEnvelope, ProviderError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-process provider replaying queued responses.
///
/// Once a queue runs dry the last response is repeated.
#[derive(Default)]
pub struct ScriptedProvider {
    submits: Mutex<VecDeque<Result<ProviderEnvelope, ProviderError>>>,
    statuses: Mutex<VecDeque<Result<ProviderEnvelope, ProviderError>>>,
    health: Mutex<Option<Result<Value, ProviderError>>>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub submitted: Mutex<Vec<AnalysisRequest>>,
    status_delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    pub fn on_submit(self, response: Result<ProviderEnvelope, ProviderError>) -> Self {
        self.submits.lock().unwrap().push_back(response);
        self
    }

    pub fn on_status(self, response: Result<ProviderEnvelope, ProviderError>) -> Self {
        self.statuses.lock().unwrap().push_back(response);
        self
    }

    pub fn on_health(self, response: Result<Value, ProviderError>) -> Self {
        *self.health.lock().unwrap() = Some(response);
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn next(
        queue: &Mutex<VecDeque<Result<ProviderEnvelope, ProviderError>>>,
    ) -> Result<ProviderEnvelope, ProviderError> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::Unreachable("no scripted response".into())))
        }
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    async fn submit(&self, request: &AnalysisRequest) -> Result<ProviderEnvelope, ProviderError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(request.clone());
        Self::next(&self.submits)
    }

    async fn status(&self, _task_id: &str) -> Result<ProviderEnvelope, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.status_delay {
            tokio::time::sleep(delay).await;
        }
        Self::next(&self.statuses)
    }

    async fn health(&self) -> Result<Value, ProviderError> {
        self.health
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(json!({"status": "healthy"})))
    }
}

pub fn accepted(task_id: &str, status: &str) -> ProviderEnvelope {
    ProviderEnvelope {
        task_id: task_id.to_string(),
        status: Some(status.to_string()),
        ..ProviderEnvelope::default()
    }
}

pub fn completed(task_id: &str, action: &str, confidence: f64) -> ProviderEnvelope {
    ProviderEnvelope {
        task_id: task_id.to_string(),
        status: Some("completed".to_string()),
        decision: Some(json!({
            "action": action,
            "confidence": confidence,
            "raw_decision": {"signal": action}
        })),
        analysis_report: Some(json!({"market_report": "steady demand"})),
        completed_at: Some("2024-05-10T12:05:30Z".to_string()),
        processing_time_seconds: Some(330.5),
        ..ProviderEnvelope::default()
    }
}
