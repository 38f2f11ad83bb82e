//! Custom widgets and line rendering for the TUI

use std::time::Duration;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::shimmer::{shimmer_spans, AnimatedDots, ProgressBar};
use super::theme::Theme;
use crate::response::{list_numbers, DocumentNode, InlineSpan, ListKind, TaskRegistry, TaskResult, TaskViewState};
use crate::transcript::{RenderedTurn, TranscriptEntry, TurnRole};

const INDENT: &str = "  ";
const DETAIL_INDENT: &str = "      ";

/// Style inline spans on top of `base`
fn inline_spans(spans: &[InlineSpan], base: Style) -> Vec<Span<'static>> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        match span {
            InlineSpan::PlainText(text) => out.push(Span::styled(text.clone(), base)),
            InlineSpan::Code(text) => out.push(Span::styled(text.clone(), Theme::code())),
            InlineSpan::Bold(children) => {
                out.extend(inline_spans(children, base.add_modifier(Modifier::BOLD)));
            }
            InlineSpan::Italic(children) => {
                out.extend(inline_spans(children, base.add_modifier(Modifier::ITALIC)));
            }
        }
    }
    out
}

/// Wrap styled content to `max_width` columns.
///
/// The first line starts with `prefix`; continuation lines are indented to
/// the prefix width. `max_width == 0` disables wrapping.
fn wrap_spans(prefix: Vec<Span<'static>>, content: Vec<Span<'static>>, max_width: usize) -> Vec<Line<'static>> {
    let prefix_width: usize = prefix.iter().map(|s| s.content.width()).sum();
    let limit = if max_width == 0 {
        usize::MAX
    } else {
        max_width.saturating_sub(prefix_width).max(1)
    };
    let continuation = " ".repeat(prefix_width);

    let mut lines = Vec::new();
    let mut current = prefix;
    let mut width = 0usize;

    for span in content {
        let style = span.style;
        let mut buf = String::new();
        for c in span.content.chars() {
            let w = c.width().unwrap_or(0);
            if width > 0 && width + w > limit {
                if !buf.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut buf), style));
                }
                let next = vec![Span::raw(continuation.clone())];
                lines.push(Line::from(std::mem::replace(&mut current, next)));
                width = 0;
            }
            buf.push(c);
            width += w;
        }
        if !buf.is_empty() {
            current.push(Span::styled(buf, style));
        }
    }

    lines.push(Line::from(current));
    lines
}

/// Lines for a tokenized reply
pub fn document_lines(nodes: &[DocumentNode], max_width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for (node, number) in list_numbers(nodes) {
        let indent = vec![Span::raw(INDENT)];
        match node {
            DocumentNode::Heading { level, spans } => {
                lines.extend(wrap_spans(indent, inline_spans(spans, Theme::heading(*level)), max_width));
            }
            DocumentNode::BoldBlock(spans) => {
                lines.extend(wrap_spans(indent, inline_spans(spans, Theme::section_header()), max_width));
            }
            DocumentNode::Paragraph(spans) => {
                lines.extend(wrap_spans(indent, inline_spans(spans, Theme::text()), max_width));
            }
            DocumentNode::ListItem { kind, spans } => {
                let marker = match kind {
                    ListKind::Unordered => "• ".to_string(),
                    ListKind::Ordered => format!("{}. ", number.unwrap_or(1)),
                };
                let prefix = vec![Span::raw(INDENT), Span::styled(marker, Theme::bullet())];
                lines.extend(wrap_spans(prefix, inline_spans(spans, Theme::text()), max_width));
            }
            DocumentNode::LineBreak => lines.push(Line::from("")),
        }
    }
    lines
}

fn detail_lines(label: &str, text: &str, style: Style, max_width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, text_line) in text.lines().enumerate() {
        let prefix = if i == 0 {
            vec![
                Span::raw(DETAIL_INDENT),
                Span::styled(format!("{label}: "), Theme::detail_label()),
            ]
        } else {
            vec![Span::raw(DETAIL_INDENT), Span::raw(" ".repeat(label.width() + 2))]
        };
        lines.extend(wrap_spans(prefix, vec![Span::styled(text_line.to_string(), style)], max_width));
    }
    lines
}

fn task_detail_lines(task: &TaskResult, max_width: usize) -> Vec<Line<'static>> {
    if !task.has_details() {
        return vec![Line::from(vec![
            Span::raw(DETAIL_INDENT),
            Span::styled("No details reported", Theme::muted()),
        ])];
    }

    let mut lines = Vec::new();
    if let Some(analysis) = &task.analysis {
        lines.extend(detail_lines("Analysis", analysis, Theme::text(), max_width));
    }
    if let Some(recommendation) = &task.recommendation {
        lines.extend(detail_lines("Recommendation", recommendation, Theme::success(), max_width));
    }
    if let Some(error) = &task.error_message {
        lines.extend(detail_lines("Error", error, Theme::error(), max_width));
    }
    if let Some(details) = task.detail_fields.as_ref().filter(|d| !d.is_empty()) {
        let pretty = serde_json::to_string_pretty(details).unwrap_or_default();
        lines.extend(detail_lines("Details", &pretty, Theme::muted(), max_width));
    }
    if let Some(when) = task.executed_at_display() {
        lines.extend(detail_lines("Executed", &when, Theme::muted(), max_width));
    }
    lines
}

/// Lines for the task block of a reply. `selected` highlights one ordinal.
pub fn task_block_lines(
    registry: &TaskRegistry,
    state: &TaskViewState,
    selected: Option<u32>,
    max_width: usize,
) -> Vec<Line<'static>> {
    if !registry.is_displayable() {
        return Vec::new();
    }

    let counts = registry.counts();
    let mut header = vec![
        Span::raw(INDENT),
        Span::styled("◆ Diagnostic Tasks ", Theme::title()),
        Span::styled(format!("✓ {}", counts.completed), Theme::success()),
    ];
    if counts.failed > 0 {
        header.push(Span::styled(format!("  ✗ {}", counts.failed), Theme::error()));
    }
    header.push(Span::styled(format!("  of {} ", counts.total), Theme::muted()));
    header.push(Span::styled(
        ProgressBar::ratio(counts.completed, counts.total, 10),
        Theme::success(),
    ));

    let mut lines = vec![Line::from(header)];
    for task in registry.tasks() {
        let expanded = registry.is_expanded(state, task.ordinal);
        let (status, status_style) = if task.succeeded {
            ("[OK]", Theme::task_ok())
        } else {
            ("[FAIL]", Theme::task_failed())
        };
        let name_style = if selected == Some(task.ordinal) {
            Theme::task_selected()
        } else {
            Theme::text()
        };
        let prefix = vec![
            Span::raw(INDENT),
            Span::styled(if expanded { "▼ " } else { "▶ " }, Theme::accent()),
            Span::styled(format!("#{} ", task.ordinal), Theme::muted()),
            Span::styled(format!("{status} "), status_style),
        ];
        lines.extend(wrap_spans(prefix, vec![Span::styled(task.name.clone(), name_style)], max_width));

        if expanded {
            lines.extend(task_detail_lines(task, max_width));
        }
    }

    if let Some(summary) = registry.summary() {
        lines.extend(detail_lines("Summary", summary, Theme::muted(), max_width));
    }
    lines
}

/// All lines for one transcript entry, including the badge and spacing
pub fn render_entry_lines(
    entry: &TranscriptEntry,
    state: Option<&TaskViewState>,
    selected: Option<u32>,
    max_width: usize,
) -> Vec<Line<'static>> {
    let turn = &entry.turn;
    let (badge_text, badge_style) = match turn.role {
        TurnRole::User => (" You ", Theme::user_badge()),
        TurnRole::Assistant => (" AI Assistant ", Theme::assistant_badge()),
        TurnRole::Error => (" ⚠ Error ", Theme::error_badge()),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(badge_text, badge_style),
        Span::styled(format!(" {}", turn.time_label()), Theme::muted()),
    ])];

    match &entry.rendered {
        RenderedTurn::PlainText(text) => {
            let style = if turn.role == TurnRole::Error {
                Theme::error()
            } else {
                Theme::text()
            };
            for text_line in text.lines() {
                lines.extend(wrap_spans(
                    vec![Span::raw(INDENT)],
                    vec![Span::styled(text_line.to_string(), style)],
                    max_width,
                ));
            }
        }
        RenderedTurn::Document { nodes, tasks } => {
            lines.extend(document_lines(nodes, max_width));
            if let Some(registry) = tasks {
                let default_state = TaskViewState::new();
                let block = task_block_lines(registry, state.unwrap_or(&default_state), selected, max_width);
                if !block.is_empty() {
                    lines.push(Line::from(""));
                    lines.extend(block);
                }
            }
        }
    }

    if let Some(usage) = turn.meta.as_ref().and_then(|m| m.usage_line()) {
        lines.push(Line::from(vec![
            Span::raw(INDENT),
            Span::styled(usage, Theme::muted()),
        ]));
    }

    lines.push(Line::from(""));
    lines
}

/// Header bar with title and endpoint
pub struct HeaderBar<'a> {
    pub title: &'a str,
    pub endpoint: &'a str,
    /// Elapsed time of the outstanding request, if any
    pub processing: Option<Duration>,
}

impl Widget for HeaderBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }

        let mut title_spans = vec![Span::styled("◆ ", Theme::accent())];
        match self.processing {
            Some(elapsed) => title_spans.extend(shimmer_spans(self.title, elapsed)),
            None => title_spans.push(Span::styled(self.title, Theme::title())),
        }
        let title_line = Line::from(title_spans);
        buf.set_line(area.x + 1, area.y, &title_line, area.width.saturating_sub(2));

        let endpoint_str = format!("⇄ {} ", self.endpoint);
        let endpoint_len = endpoint_str.width() as u16;
        let endpoint_x = area.x + area.width.saturating_sub(endpoint_len + 1);
        let endpoint_span = Span::styled(endpoint_str, Theme::muted());
        buf.set_span(endpoint_x, area.y, &endpoint_span, endpoint_len + 1);
    }
}

/// Status line: spinner and elapsed-time text, or the last notice
pub struct StatusBar<'a> {
    pub status_text: Option<String>,
    pub spinner_frame: usize,
    pub notice: Option<&'a str>,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut spans = match &self.status_text {
            Some(text) => vec![
                Span::styled(format!("{} ", AnimatedDots::new(self.spinner_frame).current()), Theme::accent()),
                Span::styled(format!("{text} (Esc to cancel)"), Theme::accent()),
            ],
            None => vec![
                Span::styled("● ", Theme::success()),
                Span::styled("Ready", Theme::dim()),
            ],
        };
        if let Some(notice) = self.notice {
            spans.push(Span::styled("  │ ", Theme::muted()));
            spans.push(Span::styled(notice.to_string(), Theme::warning()));
        }

        buf.set_line(area.x + 1, area.y, &Line::from(spans), area.width.saturating_sub(2));
    }
}

/// Input box widget
pub struct InputBox<'a> {
    pub content: &'a str,
    pub focused: bool,
}

impl Widget for InputBox<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.focused {
            Theme::border_focused()
        } else {
            Theme::border()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Span::styled(" Describe your PC issue ", Theme::muted()));

        let inner = block.inner(area);
        block.render(area, buf);

        let (display_text, style) = if self.content.is_empty() {
            (
                "e.g. 'My screen is flickering' (Enter to send, Ctrl+C to quit)",
                Theme::muted(),
            )
        } else {
            (self.content, Theme::text())
        };

        Paragraph::new(display_text)
            .style(style)
            .wrap(Wrap { trim: false })
            .render(inner, buf);
    }
}

/// Help bar showing key bindings for the focused area
pub struct HelpBar {
    pub tasks_focused: bool,
}

impl Widget for HelpBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bindings: &[(&str, &str)] = if self.tasks_focused {
            &[
                ("↑↓", "Select task"),
                ("Enter/Space", "Expand"),
                ("Tab/Esc", "Back to input"),
                ("Ctrl+C", "Quit"),
            ]
        } else {
            &[
                ("Enter", "Send"),
                ("Tab", "Tasks"),
                ("↑↓/PgUp/PgDn", "Scroll"),
                ("Ctrl+P/N", "History"),
                ("Esc", "Cancel"),
                ("Ctrl+C", "Quit"),
            ]
        };

        let mut spans = vec![Span::raw(" ")];
        for (i, (key, desc)) in bindings.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", Theme::muted()));
            }
            spans.push(Span::styled(*key, Theme::key()));
            spans.push(Span::styled(format!(" {desc}"), Theme::key_desc()));
        }

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
