//! Main TUI application

use std::collections::HashMap;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::input::{InputAction, InputState};
use super::status::ProcessingTimer;
use super::theme::Theme;
use super::widgets::{render_entry_lines, HeaderBar, HelpBar, InputBox, StatusBar};
use crate::client::{PredictionBackend, Reply};
use crate::response::TaskViewState;
use crate::transcript::{ConversationTurn, Transcript};

const SCROLL_STEP: usize = 3;

/// Which area receives key presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Tasks,
}

/// The single outstanding request
struct PendingRequest {
    id: u64,
    handle: JoinHandle<()>,
    timer: ProcessingTimer,
}

type ReplyEnvelope = (u64, crate::Result<Reply>);

pub struct App {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    input: InputState,
    transcript: Transcript,
    /// Expansion state per transcript entry index
    task_views: HashMap<usize, TaskViewState>,
    focus: Focus,
    /// Index into `selectable_tasks()`
    task_cursor: usize,
    scroll_offset: usize,
    spinner_frame: usize,
    backend: Arc<dyn PredictionBackend>,
    pending: Option<PendingRequest>,
    next_request_id: u64,
    reply_tx: mpsc::UnboundedSender<ReplyEnvelope>,
    reply_rx: mpsc::UnboundedReceiver<ReplyEnvelope>,
    notice: Option<String>,
    should_quit: bool,
    endpoint: String,
    expand_tasks: bool,
}

impl App {
    pub fn new(backend: Arc<dyn PredictionBackend>, endpoint: String, expand_tasks: bool) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        Ok(Self {
            terminal,
            input: InputState::new(),
            transcript: Transcript::new(),
            task_views: HashMap::new(),
            focus: Focus::Input,
            task_cursor: 0,
            scroll_offset: 0,
            spinner_frame: 0,
            backend,
            pending: None,
            next_request_id: 1,
            reply_tx,
            reply_rx,
            notice: None,
            should_quit: false,
            endpoint,
            expand_tasks,
        })
    }

    pub async fn run(&mut self) -> io::Result<()> {
        let poll_timeout = Duration::from_millis(16);
        let spinner_interval = Duration::from_millis(80);
        let mut last_spinner_update = Instant::now();

        while !self.should_quit {
            self.check_replies();

            if last_spinner_update.elapsed() >= spinner_interval {
                self.spinner_frame = self.spinner_frame.wrapping_add(1);
                last_spinner_update = Instant::now();
            }

            self.draw()?;

            if event::poll(poll_timeout)? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
        }

        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
        Ok(())
    }

    fn check_replies(&mut self) {
        while let Ok((id, result)) = self.reply_rx.try_recv() {
            if !self.pending.as_ref().is_some_and(|p| p.id == id) {
                debug!("Dropping reply {} for a cancelled request", id);
                continue;
            }
            if let Some(pending) = self.pending.take() {
                info!(
                    "Reply {} arrived after {:.1}s",
                    id,
                    pending.timer.elapsed().as_secs_f32()
                );
            }
            self.append_turn(ConversationTurn::from_reply(result));
        }
    }

    fn append_turn(&mut self, turn: ConversationTurn) {
        let index = self.transcript.append(turn);
        if let Some(registry) = self.transcript.get(index).and_then(|e| e.rendered.tasks()) {
            if registry.is_displayable() {
                let mut state = TaskViewState::new();
                if self.expand_tasks {
                    registry.expand_all(&mut state);
                }
                self.task_views.insert(index, state);
            }
        }
        self.scroll_to_bottom();
    }

    /// Append the user turn and start the request for it
    pub fn submit(&mut self, message: String) {
        self.notice = None;
        self.append_turn(ConversationTurn::user(message.clone()));

        let id = self.next_request_id;
        self.next_request_id += 1;
        let backend = Arc::clone(&self.backend);
        let tx = self.reply_tx.clone();
        let handle = tokio::spawn(async move {
            let result = backend.predict(&message).await;
            let _ = tx.send((id, result));
        });

        debug!("Sent request {}", id);
        self.pending = Some(PendingRequest {
            id,
            handle,
            timer: ProcessingTimer::start(),
        });
    }

    fn cancel(&mut self) {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                info!("Request {} cancelled", pending.id);
                self.notice = Some("Request cancelled".to_string());
            }
            None => self.notice = None,
        }
    }

    /// Every task row across displayable replies, in transcript order
    fn selectable_tasks(&self) -> Vec<(usize, u32)> {
        self.transcript
            .entries()
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.rendered.tasks().map(|r| (index, r)))
            .filter(|(_, registry)| registry.is_displayable())
            .flat_map(|(index, registry)| registry.tasks().iter().map(move |t| (index, t.ordinal)))
            .collect()
    }

    fn selected_task(&self) -> Option<(usize, u32)> {
        if self.focus != Focus::Tasks {
            return None;
        }
        self.selectable_tasks().get(self.task_cursor).copied()
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match self.focus {
            Focus::Input => self.handle_input_key(key),
            Focus::Tasks => self.handle_task_key(key),
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Enter && self.pending.is_some() {
            self.notice = Some("Waiting for the current reply (Esc to cancel)".to_string());
            return;
        }

        match self.input.handle_key(key) {
            InputAction::Submit(message) => self.submit(message),
            InputAction::Quit => self.should_quit = true,
            InputAction::ScrollUp => self.scroll_offset = self.scroll_offset.saturating_add(SCROLL_STEP),
            InputAction::ScrollDown => self.scroll_offset = self.scroll_offset.saturating_sub(SCROLL_STEP),
            InputAction::SwitchFocus => self.focus_tasks(),
            InputAction::Cancel => self.cancel(),
            InputAction::Edited | InputAction::None => {}
        }
    }

    fn focus_tasks(&mut self) {
        let tasks = self.selectable_tasks();
        let Some(&(last_entry, _)) = tasks.last() else {
            self.notice = Some("No diagnostic tasks to browse".to_string());
            return;
        };
        // Start on the first task of the most recent reply
        self.task_cursor = tasks
            .iter()
            .position(|(entry, _)| *entry == last_entry)
            .unwrap_or(0);
        self.focus = Focus::Tasks;
        self.notice = None;
    }

    fn handle_task_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => self.should_quit = true,
            KeyCode::Tab | KeyCode::Esc => self.focus = Focus::Input,
            KeyCode::Up => self.task_cursor = self.task_cursor.saturating_sub(1),
            KeyCode::Down => {
                let count = self.selectable_tasks().len();
                self.task_cursor = (self.task_cursor + 1).min(count.saturating_sub(1));
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::PageUp => self.scroll_offset = self.scroll_offset.saturating_add(SCROLL_STEP),
            KeyCode::PageDown => self.scroll_offset = self.scroll_offset.saturating_sub(SCROLL_STEP),
            _ => {}
        }
    }

    fn toggle_selected(&mut self) {
        let Some((index, ordinal)) = self.selected_task() else {
            return;
        };
        let Some(registry) = self.transcript.get(index).and_then(|e| e.rendered.tasks()) else {
            return;
        };
        let state = self.task_views.entry(index).or_default();
        if let Some(expanded) = registry.toggle(state, ordinal) {
            debug!("Task #{} in turn {} expanded: {}", ordinal, index, expanded);
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    fn draw(&mut self) -> io::Result<()> {
        let selected = self.selected_task();
        let status_text = self.pending.as_ref().map(|p| p.timer.status_text());
        let elapsed = self.pending.as_ref().map(|p| p.timer.elapsed());
        let transcript = &self.transcript;
        let task_views = &self.task_views;
        let input = &self.input;
        let focus = self.focus;
        let spinner_frame = self.spinner_frame;
        let scroll_offset = self.scroll_offset;
        let notice = self.notice.as_deref();
        let endpoint = self.endpoint.as_str();

        self.terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1), // Header
                    Constraint::Length(1), // Status
                    Constraint::Min(6),    // Conversation
                    Constraint::Length(3), // Input
                    Constraint::Length(1), // Help
                ])
                .split(f.area());

            f.render_widget(
                HeaderBar {
                    title: "PC Diagnostic Assistant",
                    endpoint,
                    processing: elapsed,
                },
                chunks[0],
            );

            f.render_widget(
                StatusBar {
                    status_text,
                    spinner_frame,
                    notice,
                },
                chunks[1],
            );

            Self::render_transcript(f, chunks[2], transcript, task_views, selected, scroll_offset);

            f.render_widget(
                InputBox {
                    content: &input.buffer,
                    focused: focus == Focus::Input,
                },
                chunks[3],
            );

            if focus == Focus::Input {
                let cursor_x = chunks[3].x + 1 + input.cursor_display_width() as u16;
                f.set_cursor_position((
                    cursor_x.min(chunks[3].x + chunks[3].width.saturating_sub(2)),
                    chunks[3].y + 1,
                ));
            }

            f.render_widget(
                HelpBar {
                    tasks_focused: focus == Focus::Tasks,
                },
                chunks[4],
            );
        })?;

        Ok(())
    }

    fn render_transcript(
        f: &mut Frame,
        area: Rect,
        transcript: &Transcript,
        task_views: &HashMap<usize, TaskViewState>,
        selected: Option<(usize, u32)>,
        scroll_offset: usize,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border())
            .title_top(Line::styled(" Conversation ", Theme::muted()));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let content_width = inner.width as usize;
        let mut all_lines: Vec<Line> = Vec::new();
        if transcript.is_empty() {
            all_lines.push(Line::styled(
                "  Describe a hardware or software problem to start a diagnosis.",
                Theme::muted(),
            ));
        }
        for (index, entry) in transcript.entries().iter().enumerate() {
            let selected_ordinal = selected.filter(|(i, _)| *i == index).map(|(_, o)| o);
            all_lines.extend(render_entry_lines(
                entry,
                task_views.get(&index),
                selected_ordinal,
                content_width,
            ));
        }

        // Anchored to the bottom; scroll_offset counts lines back from there
        let total_lines = all_lines.len();
        let visible_height = inner.height as usize;
        let max_scroll = total_lines.saturating_sub(visible_height);
        let actual_scroll = scroll_offset.min(max_scroll);
        let start = max_scroll.saturating_sub(actual_scroll);
        let visible: Vec<Line> = all_lines.into_iter().skip(start).take(visible_height).collect();

        f.render_widget(Paragraph::new(visible), inner);

        if total_lines > visible_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");
            let mut scrollbar_state = ScrollbarState::new(max_scroll).position(start);
            f.render_stateful_widget(
                scrollbar,
                area.inner(ratatui::layout::Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}
