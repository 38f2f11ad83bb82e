//! HTTP client for the prediction backend
//!
//! A single POST per user message, no retries. Every failure mode is mapped
//! to [`DiagChatError::Upstream`] with text that can be shown to the user as
//! an error turn.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{DiagChatConfig, RequestField};
use crate::protocol::{PredictOutcome, PredictRequest, PredictResponse, ResponseMeta};
use crate::{DiagChatError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_ERROR_DETAIL_CHARS: usize = 500;

/// A model reply: raw text plus metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub meta: ResponseMeta,
}

/// Something that turns user input into a model reply
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    async fn predict(&self, input: &str) -> Result<Reply>;
}

/// reqwest-based [`PredictionBackend`]
pub struct HttpPredictionClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
    request_field: RequestField,
    telemetry: Option<Value>,
}

impl HttpPredictionClient {
    pub fn new(config: &DiagChatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("diagchat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(
            "Prediction client: endpoint={}, timeout={:?}, field={:?}",
            config.endpoint, config.timeout, config.request_field
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout: config.timeout,
            request_field: config.request_field,
            telemetry: config.telemetry.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> DiagChatError {
        if e.is_timeout() {
            DiagChatError::Upstream(format!(
                "The request timed out after {} seconds.",
                self.timeout.as_secs()
            ))
        } else if e.is_connect() {
            DiagChatError::Upstream(
                "Could not connect to the server. Please ensure the backend is running.".to_string(),
            )
        } else {
            DiagChatError::Upstream(format!("Error: {e}"))
        }
    }
}

#[async_trait]
impl PredictionBackend for HttpPredictionClient {
    async fn predict(&self, input: &str) -> Result<Reply> {
        debug!("Sending prediction request, input length: {}", input.len());
        let body = PredictRequest::new(self.request_field, input, self.telemetry.clone());

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_reqwest_error(e))?;
        debug!(
            "Prediction response: status={}, {} bytes in {:?}",
            status,
            text.len(),
            started.elapsed()
        );

        let reply = interpret_response(status, &text);
        if let Err(e) = &reply {
            warn!("Prediction failed: {}", e);
        }
        reply
    }
}

/// Map an HTTP status and body to a reply or an upstream failure.
///
/// The backend answers `{success: false, error}` with 4xx/5xx statuses too,
/// so a parseable JSON body wins over the status code.
pub fn interpret_response(status: reqwest::StatusCode, body: &str) -> Result<Reply> {
    match serde_json::from_str::<PredictResponse>(body) {
        Ok(parsed) => match parsed.into_outcome() {
            PredictOutcome::Reply { text, meta } => Ok(Reply { text, meta }),
            PredictOutcome::Failure(message) => Err(DiagChatError::Upstream(message)),
        },
        Err(_) if status.is_success() => Err(DiagChatError::Upstream(
            "The server returned a response that could not be read.".to_string(),
        )),
        Err(_) => {
            let detail = truncate_error_detail(body.trim(), MAX_ERROR_DETAIL_CHARS);
            if detail.is_empty() {
                Err(DiagChatError::Upstream(format!("Server returned {status}")))
            } else {
                Err(DiagChatError::Upstream(format!("Server returned {status}: {detail}")))
            }
        }
    }
}

fn truncate_error_detail(detail: &str, max_chars: usize) -> String {
    if detail.chars().count() <= max_chars {
        return detail.to_string();
    }

    let mut truncated = detail.chars().take(max_chars).collect::<String>();
    truncated.push_str("... [truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_success_body() {
        let reply = interpret_response(
            StatusCode::OK,
            r#"{"success":true,"message":"Check the fan.","model":"m"}"#,
        )
        .unwrap();
        assert_eq!(reply.text, "Check the fan.");
        assert_eq!(reply.meta.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_failure_body_on_error_status() {
        let err = interpret_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"success":false,"error":"Model not loaded"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Model not loaded");
    }

    #[test]
    fn test_non_json_error_status() {
        let err = interpret_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Server returned 502 Bad Gateway: <html>bad gateway</html>"
        );

        let err = interpret_response(StatusCode::NOT_FOUND, "  ").unwrap_err();
        assert_eq!(err.to_string(), "Server returned 404 Not Found");
    }

    #[test]
    fn test_non_json_success_status() {
        let err = interpret_response(StatusCode::OK, "plain text").unwrap_err();
        assert!(matches!(err, DiagChatError::Upstream(_)));
    }

    #[test]
    fn test_truncate_error_detail() {
        let long = "x".repeat(600);
        let truncated = truncate_error_detail(&long, 500);
        assert!(truncated.ends_with("... [truncated]"));
        assert_eq!(truncated.chars().count(), 500 + "... [truncated]".len());
    }

    #[test]
    fn test_unreachable_endpoint_is_upstream_failure() {
        // Port 9 (discard) on localhost is closed on any sane test machine.
        let config = DiagChatConfig::default()
            .with_endpoint("http://127.0.0.1:9/api/predict/")
            .with_timeout(Duration::from_secs(5));
        let client = HttpPredictionClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/api/predict/");
        let result = tokio_test::block_on(client.predict("hello"));
        assert!(matches!(result, Err(DiagChatError::Upstream(_))));
    }
}
