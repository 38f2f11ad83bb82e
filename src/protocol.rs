//! Wire types for the prediction backend
//!
//! Only the subset of the backend's JSON that the client reads is modeled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RequestField;

/// Body of a prediction request.
///
/// The backend has two entry points that differ only in the name of the
/// text field.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PredictRequest {
    Input {
        input_text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        telemetry_data: Option<Value>,
    },
    Query {
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        telemetry_data: Option<Value>,
    },
}

impl PredictRequest {
    pub fn new(field: RequestField, text: &str, telemetry_data: Option<Value>) -> Self {
        match field {
            RequestField::InputText => PredictRequest::Input {
                input_text: text.to_string(),
                telemetry_data,
            },
            RequestField::Query => PredictRequest::Query {
                query: text.to_string(),
                telemetry_data,
            },
        }
    }
}

/// Token usage reported with a prediction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Metadata shown beneath an assistant turn
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseMeta {
    pub model: Option<String>,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

impl ResponseMeta {
    /// `Model: x | Tokens: total (prompt + completion)`, only when usage is known
    pub fn usage_line(&self) -> Option<String> {
        let usage = self.usage?;
        Some(format!(
            "Model: {} | Tokens: {} ({} + {})",
            self.model.as_deref().unwrap_or("unknown"),
            usage.total_tokens,
            usage.prompt_tokens,
            usage.completion_tokens
        ))
    }
}

/// Prediction response, success or failure
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What a response means for the conversation
#[derive(Debug, Clone, PartialEq)]
pub enum PredictOutcome {
    Reply { text: String, meta: ResponseMeta },
    Failure(String),
}

impl PredictResponse {
    pub fn into_outcome(self) -> PredictOutcome {
        if !self.success {
            return PredictOutcome::Failure(
                self.error
                    .unwrap_or_else(|| "An error occurred while processing your request.".to_string()),
            );
        }

        // `message` is the primary field, `prediction` the legacy one
        match self.message.or(self.prediction) {
            Some(text) => PredictOutcome::Reply {
                text,
                meta: ResponseMeta {
                    model: self.model,
                    usage: self.usage,
                    finish_reason: self.finish_reason,
                },
            },
            None => PredictOutcome::Failure("The server returned an empty response.".to_string()),
        }
    }
}
