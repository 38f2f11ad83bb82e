//! Conversation transcript
//!
//! Turns are appended once and never change. Each turn is rendered on
//! append; rendering is pure, so the cached result is always what rendering
//! the turn again would give.

use chrono::{DateTime, Local};

use crate::client::Reply;
use crate::protocol::ResponseMeta;
use crate::response::{process_reply, DocumentNode, TaskRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
    Error,
}

/// One exchanged message
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub raw_content: String,
    pub created_at: DateTime<Local>,
    /// Model and token usage, assistant turns only
    pub meta: Option<ResponseMeta>,
}

impl ConversationTurn {
    fn new(role: TurnRole, content: String, meta: Option<ResponseMeta>) -> Self {
        Self {
            role,
            raw_content: content,
            created_at: Local::now(),
            meta,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>, meta: Option<ResponseMeta>) -> Self {
        Self::new(TurnRole::Assistant, content.into(), meta)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Error, content.into(), None)
    }

    /// Turn for the outcome of one upstream call. Failures become error
    /// turns; nothing is propagated past this point.
    pub fn from_reply(result: crate::Result<Reply>) -> Self {
        match result {
            Ok(reply) => Self::assistant(reply.text, Some(reply.meta)),
            Err(e) => Self::error(e.to_string()),
        }
    }

    /// `HH:MM` for display
    pub fn time_label(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }
}

/// Render tree for one turn
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedTurn {
    /// User and error turns, shown verbatim
    PlainText(String),
    Document {
        nodes: Vec<DocumentNode>,
        tasks: Option<TaskRegistry>,
    },
}

impl RenderedTurn {
    pub fn tasks(&self) -> Option<&TaskRegistry> {
        match self {
            RenderedTurn::Document { tasks, .. } => tasks.as_ref(),
            RenderedTurn::PlainText(_) => None,
        }
    }
}

/// Dispatch on role: only assistant turns go through the reply pipeline
pub fn render_turn(turn: &ConversationTurn) -> RenderedTurn {
    match turn.role {
        TurnRole::User | TurnRole::Error => RenderedTurn::PlainText(turn.raw_content.clone()),
        TurnRole::Assistant => {
            let processed = process_reply(&turn.raw_content);
            RenderedTurn::Document {
                nodes: processed.nodes,
                tasks: processed.tasks,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub turn: ConversationTurn,
    pub rendered: RenderedTurn,
}

/// Append-only list of turns for one session
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return its index
    pub fn append(&mut self, turn: ConversationTurn) -> usize {
        let rendered = render_turn(&turn);
        self.entries.push(TranscriptEntry { turn, rendered });
        self.entries.len() - 1
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TranscriptEntry> {
        self.entries.get(index)
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.entries.iter().map(|e| &e.turn)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::InlineSpan;
    use crate::DiagChatError;

    #[test]
    fn test_append_preserves_order() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.append(ConversationTurn::user("one")), 0);
        assert_eq!(transcript.append(ConversationTurn::assistant("two", None)), 1);
        assert_eq!(transcript.append(ConversationTurn::error("three")), 2);

        let contents: Vec<&str> = transcript.turns().map(|t| t.raw_content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_user_turns_are_not_parsed() {
        let turn = ConversationTurn::user("**not bold** <MCP_TASKS>{}</MCP_TASKS>");
        assert_eq!(
            render_turn(&turn),
            RenderedTurn::PlainText("**not bold** <MCP_TASKS>{}</MCP_TASKS>".into())
        );
    }

    #[test]
    fn test_assistant_turn_without_payload() {
        let turn = ConversationTurn::assistant("**Fix**", None);
        match render_turn(&turn) {
            RenderedTurn::Document { nodes, tasks } => {
                assert_eq!(nodes, vec![DocumentNode::BoldBlock(vec![InlineSpan::plain("Fix")])]);
                assert!(tasks.is_none());
            }
            other => panic!("unexpected render: {other:?}"),
        }
    }

    #[test]
    fn test_upstream_failure_becomes_error_turn() {
        let turn = ConversationTurn::from_reply(Err(DiagChatError::Upstream("backend down".into())));
        assert_eq!(turn.role, TurnRole::Error);
        assert_eq!(turn.raw_content, "backend down");
        assert!(turn.meta.is_none());
    }

    #[test]
    fn test_reply_becomes_assistant_turn() {
        let reply = Reply {
            text: "ok".into(),
            meta: ResponseMeta {
                model: Some("m".into()),
                ..Default::default()
            },
        };
        let turn = ConversationTurn::from_reply(Ok(reply));
        assert_eq!(turn.role, TurnRole::Assistant);
        assert_eq!(turn.meta.unwrap().model.as_deref(), Some("m"));
    }
}
