//! diagchat - AI PC diagnostic assistant client
//!
//! Turns raw model replies from the prediction backend into something a
//! terminal can show:
//! - Extracts the embedded `<MCP_TASKS>` execution payload
//! - Tokenizes the remaining text into a small markdown document model
//! - Tracks per-task expand/collapse state for the rendering layer

pub mod client;
pub mod config;
pub mod plain;
pub mod protocol;
pub mod response;
pub mod transcript;
pub mod tui;

pub use client::{HttpPredictionClient, PredictionBackend, Reply};
pub use config::{DiagChatConfig, RequestField};
pub use response::{
    DocumentNode, ExtractedPayload, Extraction, InlineSpan, ListKind, TaskCounts, TaskPayloadExtractor,
    TaskRegistry, TaskResult, TaskViewState,
};
pub use transcript::{ConversationTurn, RenderedTurn, Transcript, TurnRole};

/// Result type for diagchat operations
pub type Result<T> = std::result::Result<T, DiagChatError>;

/// Errors that can occur in diagchat
#[derive(Debug, thiserror::Error)]
pub enum DiagChatError {
    /// The prediction backend reported a failure or could not be reached.
    /// The message is already fit to show to the user.
    #[error("{0}")]
    Upstream(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
