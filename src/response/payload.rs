//! Extraction of the `<MCP_TASKS>` execution payload from model output

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Opening delimiter as emitted by the backend
pub const OPEN_TAG: &str = "<MCP_TASKS>";
/// Closing delimiter as emitted by the backend
pub const CLOSE_TAG: &str = "</MCP_TASKS>";

/// Errors from parsing the text between the delimiters
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed task payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("task payload is empty")]
    Empty,
}

/// One diagnostic task reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    /// Declared sequence number. Not necessarily the rendered position.
    pub ordinal: u32,
    pub name: String,
    pub succeeded: bool,
    pub analysis: Option<String>,
    pub recommendation: Option<String>,
    pub error_message: Option<String>,
    pub detail_fields: Option<Map<String, Value>>,
    pub executed_at: Option<String>,
}

impl TaskResult {
    /// Human-readable execution time, falling back to the raw string when it
    /// is not a timestamp chrono understands.
    pub fn executed_at_display(&self) -> Option<String> {
        let raw = self.executed_at.as_deref()?;
        if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
            return Some(
                ts.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            );
        }
        if let Ok(ts) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(ts.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        Some(raw.to_string())
    }

    /// Whether there is anything to show when the task is expanded
    pub fn has_details(&self) -> bool {
        self.analysis.is_some()
            || self.recommendation.is_some()
            || self.error_message.is_some()
            || self.detail_fields.as_ref().is_some_and(|d| !d.is_empty())
            || self.executed_at.is_some()
    }
}

/// Structured execution report embedded in an assistant reply
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedPayload {
    pub executed: bool,
    pub tasks: Vec<TaskResult>,
    pub completed_count: u32,
    pub failed_count: u32,
    pub total_count: u32,
    pub summary_text: Option<String>,
}

/// The text cut out of the raw reply, kept so the original can be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedRegion {
    /// Byte offset in the cleaned text where the region was cut
    pub offset: usize,
    /// Delimiters, payload and the trimmed surrounding whitespace
    pub text: String,
}

/// What was found between the delimiters
#[derive(Debug)]
pub enum PayloadOutcome {
    /// No delimiter pair. The normal case for most replies.
    Missing,
    Parsed(ExtractedPayload),
    Malformed(PayloadError),
}

/// Result of running the extractor over one reply
#[derive(Debug)]
pub struct Extraction {
    pub cleaned: String,
    pub removed: Option<RemovedRegion>,
    pub outcome: PayloadOutcome,
}

impl Extraction {
    pub fn payload(&self) -> Option<&ExtractedPayload> {
        match &self.outcome {
            PayloadOutcome::Parsed(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (String, Option<ExtractedPayload>) {
        let payload = match self.outcome {
            PayloadOutcome::Parsed(payload) => Some(payload),
            _ => None,
        };
        (self.cleaned, payload)
    }

    /// Rebuild the raw reply from the cleaned text and the removed region
    pub fn reconstruct(&self) -> String {
        match &self.removed {
            Some(region) => {
                let mut raw = String::with_capacity(self.cleaned.len() + region.text.len());
                raw.push_str(&self.cleaned[..region.offset]);
                raw.push_str(&region.text);
                raw.push_str(&self.cleaned[region.offset..]);
                raw
            }
            None => self.cleaned.clone(),
        }
    }
}

// ── Wire format ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PayloadWire {
    #[serde(default)]
    executed: bool,
    #[serde(default)]
    tasks: Vec<Value>,
    #[serde(default)]
    tasks_completed: u32,
    #[serde(default)]
    tasks_failed: u32,
    #[serde(default)]
    total_tasks: u32,
    #[serde(default, alias = "summary")]
    execution_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskWire {
    #[serde(default)]
    task_number: Option<u32>,
    #[serde(default)]
    task_name: Option<String>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<Map<String, Value>>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl TaskWire {
    fn into_task(self, position: usize) -> TaskResult {
        let ordinal = self
            .task_number
            .filter(|n| *n > 0)
            .unwrap_or(position as u32 + 1);
        TaskResult {
            ordinal,
            name: self.task_name.unwrap_or_else(|| format!("Task {ordinal}")),
            succeeded: self.success,
            analysis: self.analysis,
            recommendation: self.recommendation,
            error_message: self.error,
            detail_fields: self.details,
            executed_at: self.timestamp,
        }
    }
}

/// Parse the text found between the delimiters
pub fn parse_payload(body: &str) -> Result<ExtractedPayload, PayloadError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(PayloadError::Empty);
    }

    let wire: PayloadWire = serde_json::from_str(body)?;
    let mut tasks = Vec::with_capacity(wire.tasks.len());
    for (position, entry) in wire.tasks.into_iter().enumerate() {
        if !entry.is_object() {
            warn!("Skipping task entry {} that is not an object", position + 1);
            continue;
        }
        match serde_json::from_value::<TaskWire>(entry) {
            Ok(task) => tasks.push(task.into_task(position)),
            Err(e) => warn!("Skipping task entry {}: {}", position + 1, e),
        }
    }

    Ok(ExtractedPayload {
        executed: wire.executed,
        tasks,
        completed_count: wire.tasks_completed,
        failed_count: wire.tasks_failed,
        total_count: wire.total_tasks,
        summary_text: wire.execution_summary,
    })
}

/// Finds the first delimiter pair in a reply and splits it off
pub struct TaskPayloadExtractor {
    block: Regex,
}

impl TaskPayloadExtractor {
    pub fn new() -> Self {
        Self {
            block: Regex::new(&format!(
                "(?is){}(.*?){}",
                regex::escape(OPEN_TAG),
                regex::escape(CLOSE_TAG)
            ))
            .unwrap(),
        }
    }

    pub fn extract(&self, raw: &str) -> Extraction {
        let Some(caps) = self.block.captures(raw) else {
            return Extraction {
                cleaned: raw.to_string(),
                removed: None,
                outcome: PayloadOutcome::Missing,
            };
        };
        // Group 0 always exists on a match; group 1 may be empty but is present.
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        let (start, end) = removal_bounds(raw, whole.start, whole.end);
        let mut cleaned = String::with_capacity(raw.len() - (end - start));
        cleaned.push_str(&raw[..start]);
        cleaned.push_str(&raw[end..]);

        let outcome = match parse_payload(body) {
            Ok(payload) => {
                debug!(
                    "Extracted task payload: {} tasks, executed={}",
                    payload.tasks.len(),
                    payload.executed
                );
                PayloadOutcome::Parsed(payload)
            }
            Err(e) => {
                warn!("Discarding task payload: {}", e);
                PayloadOutcome::Malformed(e)
            }
        };

        Extraction {
            cleaned,
            removed: Some(RemovedRegion {
                offset: start,
                text: raw[start..end].to_string(),
            }),
            outcome,
        }
    }
}

impl Default for TaskPayloadExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Widen the matched block by the whitespace around it.
///
/// Leading whitespace always goes. Trailing whitespace only goes when there
/// is no text on one of the two sides, otherwise the lines around the block
/// would be glued together.
fn removal_bounds(raw: &str, block_start: usize, block_end: usize) -> (usize, usize) {
    let before = &raw[..block_start];
    let after = &raw[block_end..];
    let start = before.trim_end().len();
    let trailing = after.len() - after.trim_start().len();

    if before.trim().is_empty() || after.trim().is_empty() {
        (start, block_end + trailing)
    } else {
        (start, block_end)
    }
}
