//! Integration tests for the reply pipeline and transcript

use async_trait::async_trait;
use diagchat::protocol::{ResponseMeta, Usage};
use diagchat::response::{extract, process_reply, tokenize, PayloadOutcome};
use diagchat::{
    ConversationTurn, DiagChatError, DocumentNode, InlineSpan, ListKind, PredictionBackend, RenderedTurn, Reply,
    TaskCounts, TaskRegistry, TaskViewState, Transcript, TurnRole,
};
use pretty_assertions::assert_eq;

const DIAGNOSIS: &str = "**Diagnosis**\nYour fan is failing.\n<MCP_TASKS>{\"executed\":true,\"tasks\":[{\"task_number\":1,\"task_name\":\"CheckFan\",\"success\":true}],\"tasks_completed\":1,\"tasks_failed\":0,\"total_tasks\":1}</MCP_TASKS>";

const THREE_TASKS: &str = r#"Ran three checks.
<MCP_TASKS>
{"executed": true,
 "tasks": [
   {"task_number": 1, "task_name": "CheckFan", "success": true, "analysis": "Fan at 300 RPM"},
   {"task_number": 2, "task_name": "CheckTemps", "success": true},
   {"task_number": 3, "task_name": "ReadSmart", "success": false, "error": "Access denied"}
 ],
 "tasks_completed": 2, "tasks_failed": 1, "total_tasks": 3,
 "execution_summary": "2 of 3 checks passed"}
</MCP_TASKS>
Let me know if the noise continues."#;

/// A backend that answers from a fixed script
struct ScriptedBackend {
    reply: std::result::Result<String, String>,
}

#[async_trait]
impl PredictionBackend for ScriptedBackend {
    async fn predict(&self, _input: &str) -> diagchat::Result<Reply> {
        match &self.reply {
            Ok(text) => Ok(Reply {
                text: text.clone(),
                meta: ResponseMeta {
                    model: Some("diag-reasoner".to_string()),
                    usage: Some(Usage {
                        prompt_tokens: 120,
                        completion_tokens: 80,
                        total_tokens: 200,
                    }),
                    finish_reason: Some("stop".to_string()),
                },
            }),
            Err(message) => Err(DiagChatError::Upstream(message.clone())),
        }
    }
}

/// The documented end-to-end example
#[test]
fn test_diagnosis_reply_end_to_end() {
    let reply = process_reply(DIAGNOSIS);
    assert_eq!(reply.cleaned, "**Diagnosis**\nYour fan is failing.");

    let registry = reply.tasks.expect("payload should parse");
    assert_eq!(registry.tasks().len(), 1);
    let task = &registry.tasks()[0];
    assert_eq!(task.ordinal, 1);
    assert_eq!(task.name, "CheckFan");
    assert!(task.succeeded);
    assert_eq!(
        registry.counts(),
        TaskCounts {
            completed: 1,
            failed: 0,
            total: 1
        }
    );

    assert_eq!(
        reply.nodes,
        vec![
            DocumentNode::BoldBlock(vec![InlineSpan::plain("Diagnosis")]),
            DocumentNode::Paragraph(vec![InlineSpan::plain("Your fan is failing.")]),
        ]
    );
}

/// Cleaned text plus the removed region gives back the raw reply
#[test]
fn test_extraction_reconstructs_raw_text() {
    for raw in [DIAGNOSIS, THREE_TASKS] {
        let extraction = extract(raw);
        assert!(extraction.payload().is_some());
        assert!(!extraction.cleaned.contains("<MCP_TASKS>"));
        assert_eq!(extraction.reconstruct(), raw);
    }

    let extraction = extract(THREE_TASKS);
    assert_eq!(extraction.payload().map(|p| p.tasks.len()), Some(3));
}

#[test]
fn test_reply_without_delimiters_is_unchanged() {
    let raw = "Try updating your graphics driver.\n\n- Open Device Manager";
    let extraction = extract(raw);
    assert_eq!(extraction.cleaned, raw);
    assert!(matches!(extraction.outcome, PayloadOutcome::Missing));
    assert!(process_reply(raw).tasks.is_none());
}

#[test]
fn test_invalid_payload_is_removed_but_absent() {
    let raw = "Checked your disk.\n<MCP_TASKS>{\"executed\": tru</MCP_TASKS>";
    let extraction = extract(raw);
    assert_eq!(extraction.cleaned, "Checked your disk.");
    assert!(matches!(extraction.outcome, PayloadOutcome::Malformed(_)));
    assert!(extraction.payload().is_none());
    assert_eq!(extraction.reconstruct(), raw);
}

#[test]
fn test_tokenize_block_kinds() {
    let nodes = tokenize("**Section**\n- item one\n- item two\n1. first\nplain text");
    assert_eq!(
        nodes,
        vec![
            DocumentNode::BoldBlock(vec![InlineSpan::plain("Section")]),
            DocumentNode::ListItem {
                kind: ListKind::Unordered,
                spans: vec![InlineSpan::plain("item one")],
            },
            DocumentNode::ListItem {
                kind: ListKind::Unordered,
                spans: vec![InlineSpan::plain("item two")],
            },
            DocumentNode::ListItem {
                kind: ListKind::Ordered,
                spans: vec![InlineSpan::plain("first")],
            },
            DocumentNode::Paragraph(vec![InlineSpan::plain("plain text")]),
        ]
    );
}

#[test]
fn test_tokenize_inline_spans() {
    let nodes = tokenize("Use `ls -la` to **list** files");
    assert_eq!(
        nodes,
        vec![DocumentNode::Paragraph(vec![
            InlineSpan::plain("Use "),
            InlineSpan::code("ls -la"),
            InlineSpan::plain(" to "),
            InlineSpan::bold("list"),
            InlineSpan::plain(" files"),
        ])]
    );
}

#[test]
fn test_double_toggle_restores_state() {
    let registry = process_reply(THREE_TASKS).tasks.unwrap();
    let mut state = TaskViewState::new();

    for ordinal in [1, 2, 3] {
        let before = registry.is_expanded(&state, ordinal);
        registry.toggle(&mut state, ordinal);
        registry.toggle(&mut state, ordinal);
        assert_eq!(registry.is_expanded(&state, ordinal), before);
    }

    // Unknown ordinals are ignored
    assert_eq!(registry.toggle(&mut state, 42), None);
    assert!(!registry.is_expanded(&state, 42));
}

#[test]
fn test_declared_counts_are_reported() {
    let registry: TaskRegistry = process_reply(THREE_TASKS).tasks.unwrap();
    assert_eq!(
        registry.counts(),
        TaskCounts {
            completed: 2,
            failed: 1,
            total: 3
        }
    );
    assert_eq!(registry.summary(), Some("2 of 3 checks passed"));
    assert_eq!(registry.task(3).and_then(|t| t.error_message.as_deref()), Some("Access denied"));
}

#[test]
fn test_mismatched_counts_are_still_trusted() {
    let raw = r#"<MCP_TASKS>{"executed":true,"tasks":[{"task_number":1,"task_name":"A","success":true}],"tasks_completed":4,"tasks_failed":0,"total_tasks":4}</MCP_TASKS>"#;
    let registry = process_reply(raw).tasks.unwrap();
    assert_eq!(registry.counts().total, 4);
    assert_eq!(registry.recount().total, 1);
    assert!(!registry.counts_consistent());
}

/// A scripted backend feeding the transcript the way the UI does
#[tokio::test]
async fn test_backend_reply_becomes_assistant_turn() {
    let backend = ScriptedBackend {
        reply: Ok(THREE_TASKS.to_string()),
    };
    let mut transcript = Transcript::new();
    transcript.append(ConversationTurn::user("my fan is loud"));
    let index = transcript.append(ConversationTurn::from_reply(backend.predict("my fan is loud").await));

    let entry = transcript.get(index).unwrap();
    assert_eq!(entry.turn.role, TurnRole::Assistant);
    assert_eq!(
        entry.turn.meta.as_ref().and_then(|m| m.usage_line()).as_deref(),
        Some("Model: diag-reasoner | Tokens: 200 (120 + 80)")
    );
    let registry = entry.rendered.tasks().expect("tasks should be attached");
    assert!(registry.is_displayable());
    assert_eq!(registry.tasks().len(), 3);
    assert_eq!(transcript.len(), 2);
}

#[tokio::test]
async fn test_backend_failure_becomes_error_turn() {
    let backend = ScriptedBackend {
        reply: Err("Could not connect to the server. Please ensure the backend is running.".to_string()),
    };
    let mut transcript = Transcript::new();
    let index = transcript.append(ConversationTurn::from_reply(backend.predict("hello").await));

    let entry = transcript.get(index).unwrap();
    assert_eq!(entry.turn.role, TurnRole::Error);
    assert_eq!(
        entry.rendered,
        RenderedTurn::PlainText("Could not connect to the server. Please ensure the backend is running.".to_string())
    );
    assert!(entry.rendered.tasks().is_none());
}
