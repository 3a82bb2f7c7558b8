//! Client side of the external analysis provider.
//!
//! The provider runs the actual multi-agent analysis asynchronously. The
//! gateway only ever submits work, asks for status and checks liveness,
//! all through the [`AnalysisProvider`] trait.

mod client;
mod error_body;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::HttpProvider;
pub use error_body::extract_error_message;

/// Body of a submit request forwarded to the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_vendor_config: Option<Value>,
}

/// Envelope returned by both the submit and the status endpoints
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderEnvelope {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub decision: Option<Value>,
    #[serde(default)]
    pub analysis_report: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub processing_time_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Connection refused, DNS failure, timeout or a truncated body
    #[error("failed to reach trading service: {0}")]
    Unreachable(String),
    /// The provider answered with an unexpected status code
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// The provider answered successfully with a body we cannot decode
    #[error("failed to parse trading service response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Submits a new analysis. Succeeds only on `202 Accepted`.
    async fn submit(&self, request: &AnalysisRequest) -> Result<ProviderEnvelope, ProviderError>;

    /// Fetches the current state of a submitted analysis. Succeeds only on `200 OK`.
    async fn status(&self, task_id: &str) -> Result<ProviderEnvelope, ProviderError>;

    /// Returns the provider's health payload. Succeeds only on `200 OK`.
    async fn health(&self) -> Result<Value, ProviderError>;
}
