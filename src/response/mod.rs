//! Post-processing of assistant replies
//!
//! raw reply → [`TaskPayloadExtractor`] → cleaned text + optional payload,
//! cleaned text → [`markdown::tokenize`] → document nodes,
//! payload → [`TaskRegistry`].

pub mod markdown;
pub mod payload;
pub mod tasks;

pub use markdown::{
    list_numbers, spans_text, tokenize, tokenize_inline, DocumentNode, InlineSpan, ListKind, MarkdownTokenizer,
};
pub use payload::{
    parse_payload, ExtractedPayload, Extraction, PayloadError, PayloadOutcome, RemovedRegion,
    TaskPayloadExtractor, TaskResult,
};
pub use tasks::{TaskCounts, TaskRegistry, TaskViewState};

use std::sync::OnceLock;

static EXTRACTOR: OnceLock<TaskPayloadExtractor> = OnceLock::new();

fn extractor() -> &'static TaskPayloadExtractor {
    EXTRACTOR.get_or_init(TaskPayloadExtractor::new)
}

/// A reply ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedReply {
    pub cleaned: String,
    pub nodes: Vec<DocumentNode>,
    pub tasks: Option<TaskRegistry>,
}

/// Run one assistant reply through extraction and tokenization
pub fn process_reply(raw: &str) -> ProcessedReply {
    let (cleaned, payload) = extract(raw).into_parts();
    let nodes = tokenize(&cleaned);
    ProcessedReply {
        cleaned,
        nodes,
        tasks: payload.map(TaskRegistry::new),
    }
}

/// Extract with the shared extractor
pub fn extract(raw: &str) -> Extraction {
    extractor().extract(raw)
}
