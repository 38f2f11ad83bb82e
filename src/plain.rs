//! Plain-text rendering for non-interactive output

use crate::response::{list_numbers, spans_text, DocumentNode, ListKind, TaskRegistry, TaskViewState};
use crate::transcript::{ConversationTurn, RenderedTurn, TurnRole};

/// Render document nodes as terminal text, one string per output line
pub fn document_lines(nodes: &[DocumentNode]) -> Vec<String> {
    let mut lines = Vec::with_capacity(nodes.len());

    for (node, number) in list_numbers(nodes) {
        match node {
            DocumentNode::Heading { level, spans } => {
                let text = spans_text(spans);
                let rule = if *level == 1 { '=' } else { '-' };
                let width = text.chars().count();
                lines.push(text);
                if *level < 3 {
                    lines.push(rule.to_string().repeat(width));
                }
            }
            DocumentNode::BoldBlock(spans) => lines.push(spans_text(spans).to_uppercase()),
            DocumentNode::Paragraph(spans) => lines.push(spans_text(spans)),
            DocumentNode::ListItem { kind: ListKind::Unordered, spans } => {
                lines.push(format!("  • {}", spans_text(spans)));
            }
            DocumentNode::ListItem { kind: ListKind::Ordered, spans } => {
                lines.push(format!("  {}. {}", number.unwrap_or(1), spans_text(spans)));
            }
            DocumentNode::LineBreak => lines.push(String::new()),
        }
    }
    lines
}

/// Render the task block of a reply. Collapsed tasks show one line each.
pub fn task_lines(registry: &TaskRegistry, state: &TaskViewState) -> Vec<String> {
    if !registry.is_displayable() {
        return Vec::new();
    }

    let counts = registry.counts();
    let mut header = format!("Diagnostic Tasks Executed  Completed: {}", counts.completed);
    if counts.failed > 0 {
        header.push_str(&format!(" | Failed: {}", counts.failed));
    }
    header.push_str(&format!(" | Total: {}", counts.total));

    let mut lines = vec![header];
    for task in registry.tasks() {
        let expanded = registry.is_expanded(state, task.ordinal);
        let marker = if expanded { '▼' } else { '▶' };
        let status = if task.succeeded { "[OK]" } else { "[FAIL]" };
        lines.push(format!("  {marker} #{} {status} {}", task.ordinal, task.name));

        if !expanded {
            continue;
        }
        if let Some(analysis) = &task.analysis {
            lines.push(format!("      Analysis: {analysis}"));
        }
        if let Some(recommendation) = &task.recommendation {
            lines.push(format!("      Recommendation: {recommendation}"));
        }
        if let Some(error) = &task.error_message {
            lines.push(format!("      Error: {error}"));
        }
        if let Some(details) = task.detail_fields.as_ref().filter(|d| !d.is_empty()) {
            lines.push("      Details:".to_string());
            let pretty = serde_json::to_string_pretty(details).unwrap_or_default();
            lines.extend(pretty.lines().map(|l| format!("        {l}")));
        }
        if let Some(when) = task.executed_at_display() {
            lines.push(format!("      Executed: {when}"));
        }
    }

    if let Some(summary) = registry.summary() {
        lines.push(String::new());
        lines.push("Execution summary:".to_string());
        lines.extend(summary.lines().map(|l| format!("  {l}")));
    }
    lines
}

/// Full text for one turn: a header line, the body and metadata
pub fn turn_text(turn: &ConversationTurn, rendered: &RenderedTurn, state: Option<&TaskViewState>) -> String {
    let label = match turn.role {
        TurnRole::User => "You",
        TurnRole::Assistant => "AI Assistant",
        TurnRole::Error => "Error",
    };
    let mut lines = vec![format!("[{}] {}", turn.time_label(), label)];

    match rendered {
        RenderedTurn::PlainText(text) => lines.extend(text.lines().map(str::to_string)),
        RenderedTurn::Document { nodes, tasks } => {
            lines.extend(document_lines(nodes));
            if let Some(registry) = tasks {
                let default_state = TaskViewState::new();
                let task_block = task_lines(registry, state.unwrap_or(&default_state));
                if !task_block.is_empty() {
                    lines.push(String::new());
                    lines.extend(task_block);
                }
            }
        }
    }

    if let Some(usage) = turn.meta.as_ref().and_then(|m| m.usage_line()) {
        lines.push(usage);
    }
    lines.join("\n")
}
