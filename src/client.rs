//! Consumer side of the gateway: submit an analysis and poll it to the end.
//!
//! Polling only stops waiting; it never cancels the analysis server-side.

use crate::core::TaskStatus;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("task {task_id} still {status} after {attempts} polls")]
    Timeout {
        task_id: String,
        status: String,
        attempts: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionSummary {
    pub action: String,
    pub confidence: f64,
}

/// The subset of a gateway task the client cares about
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub ticker: String,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub processing_time_seconds: Option<f64>,
    #[serde(default)]
    pub decision: Option<DecisionSummary>,
}

impl TaskSummary {
    pub fn is_terminal(&self) -> bool {
        self.status
            .parse::<TaskStatus>()
            .map(|s| s.is_terminal())
            .unwrap_or(false)
    }
}

pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(GatewayClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn decode(response: reqwest::Response) -> Result<TaskSummary, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<TaskSummary>().await?);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("no error message")
            .to_string();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn submit(&self, ticker: &str, date: &str) -> Result<TaskSummary, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/trading/analyze", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({ "ticker": ticker, "date": date }))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn fetch(&self, task_id: &str) -> Result<TaskSummary, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/trading/analysis/{}", self.base_url, task_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Polls a task every `interval` until it is terminal or `max_attempts` polls were made.
    ///
    /// A `502` from the gateway means the provider could not be reached this
    /// time and counts as an attempt rather than an error.
    pub async fn wait_for<F>(
        &self,
        task_id: &str,
        interval: Duration,
        max_attempts: u32,
        mut on_poll: F,
    ) -> Result<TaskSummary, ClientError>
    where
        F: FnMut(u32, Option<&TaskSummary>),
    {
        let mut last_status = "pending".to_string();
        for attempt in 1..=max_attempts {
            match self.fetch(task_id).await {
                Ok(task) => {
                    on_poll(attempt, Some(&task));
                    if task.is_terminal() {
                        return Ok(task);
                    }
                    last_status = task.status;
                }
                Err(ClientError::Api { status, message })
                    if status == StatusCode::BAD_GATEWAY.as_u16() =>
                {
                    debug!("Poll {} of {} hit a gateway error: {}", attempt, task_id, message);
                    on_poll(attempt, None);
                }
                Err(e) => return Err(e),
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Err(ClientError::Timeout {
            task_id: task_id.to_string(),
            status: last_status,
            attempts: max_attempts,
        })
    }
}
