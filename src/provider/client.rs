use super::{
    extract_error_message, AnalysisProvider, AnalysisRequest, ProviderEnvelope, ProviderError,
};
use crate::config::{ConfigError, ProviderConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// [`AnalysisProvider`] speaking JSON over HTTP to the analysis service.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    http: reqwest::Client,
    base_url: Url,
    api_prefix: Vec<String>,
    timeout: Duration,
    health_timeout: Duration,
}

impl HttpProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::Invalid(format!("provider.base_url: {}", e)))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "provider.base_url must be an http(s) URL, got '{}'",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("provider http client: {}", e)))?;

        Ok(HttpProvider {
            http,
            base_url,
            api_prefix: config
                .api_prefix
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            timeout: config.timeout,
            health_timeout: config.health_timeout,
        })
    }

    /// Builds `base_url/<segments>`, percent-encoding each segment.
    fn endpoint<'s>(
        &self,
        with_prefix: bool,
        segments: impl IntoIterator<Item = &'s str>,
    ) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ProviderError::Unreachable(format!("invalid base url {}", self.base_url))
            })?;
            path.pop_if_empty();
            if with_prefix {
                path.extend(self.api_prefix.iter());
            }
            path.extend(segments);
        }
        Ok(url)
    }

    fn describe(err: reqwest::Error, timeout: Duration) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Unreachable(format!(
                "request timed out after {}",
                humantime::format_duration(timeout)
            ))
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }

    async fn read_body(
        response: reqwest::Response,
        timeout: Duration,
    ) -> Result<(StatusCode, String), ProviderError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::describe(e, timeout))?;
        debug!("Trading service answered {} ({} bytes)", status, body.len());
        Ok((status, body))
    }

    fn decode_envelope(body: &str) -> Result<ProviderEnvelope, ProviderError> {
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl AnalysisProvider for HttpProvider {
    async fn submit(&self, request: &AnalysisRequest) -> Result<ProviderEnvelope, ProviderError> {
        let url = self.endpoint(true, ["analyze"])?;
        debug!("Submitting analysis for {} to {}", request.ticker, url);

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::describe(e, self.timeout))?;
        let (status, body) = Self::read_body(response, self.timeout).await?;

        if status != StatusCode::ACCEPTED {
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(&body, status.as_u16()),
            });
        }
        Self::decode_envelope(&body)
    }

    async fn status(&self, task_id: &str) -> Result<ProviderEnvelope, ProviderError> {
        let url = self.endpoint(true, ["analysis", task_id])?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Self::describe(e, self.timeout))?;
        let (status, body) = Self::read_body(response, self.timeout).await?;

        if status != StatusCode::OK {
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(&body, status.as_u16()),
            });
        }
        Self::decode_envelope(&body)
    }

    async fn health(&self) -> Result<Value, ProviderError> {
        let url = self.endpoint(false, ["health"])?;

        let response = self
            .http
            .get(url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| Self::describe(e, self.health_timeout))?;
        let (status, body) = Self::read_body(response, self.health_timeout).await?;

        if status != StatusCode::OK {
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message: "trading service returned non-200 status".to_string(),
            });
        }
        // Liveness only cares about the status code; an odd body is passed through as null.
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn provider_for(base_url: &str, timeout: Duration) -> HttpProvider {
        HttpProvider::from_config(&ProviderConfig {
            base_url: base_url.to_string(),
            api_prefix: "/api/v1".to_string(),
            timeout,
            health_timeout: timeout,
        })
        .unwrap()
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            ticker: "NVDA".to_string(),
            date: "2024-05-10".to_string(),
            llm_config: Some(json!({"deep_think_llm": "gpt-4o-mini"})),
            data_vendor_config: None,
        }
    }

    #[tokio::test]
    async fn submit_forwards_request_and_accepts_202() {
        let router = Router::new().route(
            "/api/v1/analyze",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["ticker"], "NVDA");
                assert_eq!(body["llm_config"]["deep_think_llm"], "gpt-4o-mini");
                assert!(body.get("data_vendor_config").is_none());
                (
                    AxumStatus::ACCEPTED,
                    Json(json!({"task_id": "abc-123", "status": "pending", "ticker": "NVDA"})),
                )
            }),
        );
        let provider = provider_for(&spawn(router).await, Duration::from_secs(5));

        let envelope = provider.submit(&request()).await.unwrap();
        assert_eq!(envelope.task_id, "abc-123");
        assert_eq!(envelope.status.as_deref(), Some("pending"));
    }

    #[tokio::test]
    async fn submit_rejects_anything_but_202() {
        let router = Router::new().route(
            "/api/v1/analyze",
            post(|| async {
                (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({"detail": [{"msg": "Ticker must be between 1 and 10 characters"}]})),
                )
            }),
        );
        let provider = provider_for(&spawn(router).await, Duration::from_secs(5));

        let err = provider.submit(&request()).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Rejected {
                status: 422,
                message: "Ticker must be between 1 and 10 characters".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn status_encodes_task_id_and_surfaces_detail() {
        let router = Router::new().route(
            "/api/v1/analysis/:task_id",
            get(|Path(task_id): Path<String>| async move {
                if task_id == "abc 123" {
                    (
                        AxumStatus::INTERNAL_SERVER_ERROR,
                        Json(json!({"detail": "model timeout"})),
                    )
                } else {
                    (AxumStatus::NOT_FOUND, Json(json!({"detail": "unknown"})))
                }
            }),
        );
        let provider = provider_for(&spawn(router).await, Duration::from_secs(5));

        let err = provider.status("abc 123").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Rejected {
                status: 500,
                message: "model timeout".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn status_reports_malformed_success_body() {
        let router = Router::new().route(
            "/api/v1/analysis/:task_id",
            get(|| async { "definitely not json" }),
        );
        let provider = provider_for(&spawn(router).await, Duration::from_secs(5));

        assert!(matches!(
            provider.status("abc-123").await,
            Err(ProviderError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn slow_provider_is_unreachable() {
        let router = Router::new().route(
            "/api/v1/analysis/:task_id",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"task_id": "abc-123", "status": "processing"}))
            }),
        );
        let provider = provider_for(&spawn(router).await, Duration::from_millis(200));

        match provider.status("abc-123").await {
            Err(ProviderError::Unreachable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let provider = provider_for(&format!("http://{}", addr), Duration::from_secs(2));

        assert!(matches!(
            provider.submit(&request()).await,
            Err(ProviderError::Unreachable(_))
        ));
        assert!(matches!(
            provider.health().await,
            Err(ProviderError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn health_is_served_outside_the_api_prefix() {
        let router = Router::new().route(
            "/health",
            get(|| async { Json(json!({"status": "healthy", "version": "1.0"})) }),
        );
        let provider = provider_for(&spawn(router).await, Duration::from_secs(5));

        let payload = provider.health().await.unwrap();
        assert_eq!(payload["status"], "healthy");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let config = ProviderConfig {
            base_url: "mailto:ops@example.com".to_string(),
            ..ProviderConfig::default()
        };
        assert!(HttpProvider::from_config(&config).is_err());
    }
}
