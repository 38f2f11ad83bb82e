//! Message input line for the TUI

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthChar;

/// What the app should do after a key press in the input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    None,
    /// Send the message (already trimmed, never empty)
    Submit(String),
    Quit,
    ScrollUp,
    ScrollDown,
    /// Move focus to the task list
    SwitchFocus,
    /// Esc: cancel the outstanding request, if any
    Cancel,
    /// Buffer changed
    Edited,
}

/// Input buffer with cursor and sent-message history.
///
/// `cursor` is a character index, not a byte index.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub buffer: String,
    pub cursor: usize,
    history: Vec<String>,
    /// Position while browsing history, counted back from the newest entry
    history_index: Option<usize>,
    /// Draft saved when history browsing starts
    saved_input: String,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    fn char_count(&self) -> usize {
        self.buffer.chars().count()
    }

    fn char_to_byte_index(&self, char_idx: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_idx)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.buffer.len())
    }

    fn insert_char(&mut self, c: char) {
        let byte_idx = self.char_to_byte_index(self.cursor);
        self.buffer.insert(byte_idx, c);
        self.cursor += 1;
    }

    fn remove_char_before_cursor(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.remove_char_at_cursor();
        }
    }

    fn remove_char_at_cursor(&mut self) {
        if self.cursor < self.char_count() {
            let byte_idx = self.char_to_byte_index(self.cursor);
            self.buffer.remove(byte_idx);
        }
    }

    fn set_buffer(&mut self, content: String) {
        self.buffer = content;
        self.cursor = self.char_count();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => InputAction::Quit,

            KeyCode::Enter => {
                let message = self.buffer.trim().to_string();
                if message.is_empty() {
                    return InputAction::None;
                }
                self.history.push(message.clone());
                self.buffer.clear();
                self.cursor = 0;
                self.history_index = None;
                InputAction::Submit(message)
            }

            KeyCode::Backspace => {
                self.remove_char_before_cursor();
                InputAction::Edited
            }
            KeyCode::Delete => {
                self.remove_char_at_cursor();
                InputAction::Edited
            }
            KeyCode::Char('u') if ctrl => {
                self.buffer.clear();
                self.cursor = 0;
                InputAction::Edited
            }
            KeyCode::Char('w') if ctrl => {
                self.delete_word();
                InputAction::Edited
            }

            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                InputAction::None
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_count());
                InputAction::None
            }
            KeyCode::Home => {
                self.cursor = 0;
                InputAction::None
            }
            KeyCode::Char('a') if ctrl => {
                self.cursor = 0;
                InputAction::None
            }
            KeyCode::End => {
                self.cursor = self.char_count();
                InputAction::None
            }
            KeyCode::Char('e') if ctrl => {
                self.cursor = self.char_count();
                InputAction::None
            }

            KeyCode::Char('p') if ctrl => {
                self.history_prev();
                InputAction::Edited
            }
            KeyCode::Char('n') if ctrl => {
                self.history_next();
                InputAction::Edited
            }

            KeyCode::Up | KeyCode::PageUp => InputAction::ScrollUp,
            KeyCode::Down | KeyCode::PageDown => InputAction::ScrollDown,
            KeyCode::Tab => InputAction::SwitchFocus,
            KeyCode::Esc => InputAction::Cancel,

            KeyCode::Char(c) if !ctrl => {
                self.insert_char(c);
                InputAction::Edited
            }

            _ => InputAction::None,
        }
    }

    fn delete_word(&mut self) {
        while self.cursor > 0 && self.char_before_cursor() == Some(' ') {
            self.remove_char_before_cursor();
        }
        while self.cursor > 0 && self.char_before_cursor() != Some(' ') {
            self.remove_char_before_cursor();
        }
    }

    fn char_before_cursor(&self) -> Option<char> {
        self.cursor
            .checked_sub(1)
            .and_then(|idx| self.buffer.chars().nth(idx))
    }

    fn history_prev(&mut self) {
        let next = match self.history_index {
            None if self.history.is_empty() => return,
            None => {
                self.saved_input = std::mem::take(&mut self.buffer);
                0
            }
            Some(idx) if idx + 1 < self.history.len() => idx + 1,
            Some(_) => return,
        };
        self.history_index = Some(next);
        let entry = self.history[self.history.len() - 1 - next].clone();
        self.set_buffer(entry);
    }

    fn history_next(&mut self) {
        match self.history_index {
            Some(0) => {
                self.history_index = None;
                let draft = std::mem::take(&mut self.saved_input);
                self.set_buffer(draft);
            }
            Some(idx) => {
                self.history_index = Some(idx - 1);
                let entry = self.history[self.history.len() - idx].clone();
                self.set_buffer(entry);
            }
            None => {}
        }
    }

    /// Cursor position in terminal columns (wide characters count double)
    pub fn cursor_display_width(&self) -> usize {
        self.buffer
            .chars()
            .take(self.cursor)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(state: &mut InputState, text: &str) {
        for c in text.chars() {
            state.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_submit_trims_and_clears() {
        let mut state = InputState::new();
        type_str(&mut state, "  fan is loud ");
        assert_eq!(
            state.handle_key(key(KeyCode::Enter)),
            InputAction::Submit("fan is loud".into())
        );
        assert!(state.buffer.is_empty());
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn test_blank_submit_is_ignored() {
        let mut state = InputState::new();
        type_str(&mut state, "   ");
        assert_eq!(state.handle_key(key(KeyCode::Enter)), InputAction::None);
        assert_eq!(state.buffer, "   ");
    }

    #[test]
    fn test_backspace_unicode() {
        let mut state = InputState::new();
        type_str(&mut state, "风扇");
        state.handle_key(key(KeyCode::Backspace));
        assert_eq!(state.buffer, "风");
        assert_eq!(state.cursor, 1);
        assert_eq!(state.cursor_display_width(), 2);
    }

    #[test]
    fn test_insert_in_middle() {
        let mut state = InputState::new();
        type_str(&mut state, "GP");
        state.handle_key(key(KeyCode::Left));
        type_str(&mut state, "xx");
        assert_eq!(state.buffer, "GxxP");
        assert_eq!(state.cursor, 3);
    }

    #[test]
    fn test_delete_word() {
        let mut state = InputState::new();
        type_str(&mut state, "screen flickers  ");
        state.handle_key(ctrl('w'));
        assert_eq!(state.buffer, "screen ");
    }

    #[test]
    fn test_history_navigation() {
        let mut state = InputState::new();
        type_str(&mut state, "first");
        state.handle_key(key(KeyCode::Enter));
        type_str(&mut state, "second");
        state.handle_key(key(KeyCode::Enter));
        type_str(&mut state, "draft");

        state.handle_key(ctrl('p'));
        assert_eq!(state.buffer, "second");
        state.handle_key(ctrl('p'));
        assert_eq!(state.buffer, "first");
        state.handle_key(ctrl('p'));
        assert_eq!(state.buffer, "first");
        state.handle_key(ctrl('n'));
        assert_eq!(state.buffer, "second");
        state.handle_key(ctrl('n'));
        assert_eq!(state.buffer, "draft");
    }

    #[test]
    fn test_control_keys() {
        let mut state = InputState::new();
        assert_eq!(state.handle_key(ctrl('c')), InputAction::Quit);
        assert_eq!(state.handle_key(key(KeyCode::Tab)), InputAction::SwitchFocus);
        assert_eq!(state.handle_key(key(KeyCode::Esc)), InputAction::Cancel);
        assert_eq!(state.handle_key(key(KeyCode::PageUp)), InputAction::ScrollUp);
    }
}
