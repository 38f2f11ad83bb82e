//! Color theme for the TUI - using ANSI colors for better terminal compatibility

use ratatui::style::{Color, Modifier, Style};

/// Theme using ANSI colors that work well across terminal themes
pub struct Theme;

impl Theme {
    pub const CYAN: Color = Color::Cyan;
    pub const GREEN: Color = Color::Green;
    pub const YELLOW: Color = Color::Yellow;
    pub const RED: Color = Color::Red;
    pub const MAGENTA: Color = Color::Magenta;
    pub const DARK_GRAY: Color = Color::DarkGray;

    pub fn title() -> Style {
        Style::default()
            .fg(Self::CYAN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default()
    }

    pub fn dim() -> Style {
        Style::default().add_modifier(Modifier::DIM)
    }

    pub fn success() -> Style {
        Style::default().fg(Self::GREEN)
    }

    pub fn warning() -> Style {
        Style::default().fg(Self::YELLOW)
    }

    pub fn error() -> Style {
        Style::default().fg(Self::RED)
    }

    pub fn accent() -> Style {
        Style::default().fg(Self::CYAN)
    }

    pub fn muted() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }

    pub fn border() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::CYAN)
    }

    // Document styles
    pub fn heading(level: u8) -> Style {
        let color = match level {
            1 => Self::YELLOW,
            2 => Self::CYAN,
            _ => Self::MAGENTA,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn section_header() -> Style {
        Style::default()
            .fg(Self::CYAN)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    pub fn code() -> Style {
        Style::default().fg(Self::YELLOW)
    }

    pub fn bullet() -> Style {
        Style::default().fg(Self::CYAN)
    }

    // Badge styles
    pub fn user_badge() -> Style {
        Style::default()
            .bg(Self::CYAN)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    }

    pub fn assistant_badge() -> Style {
        Style::default()
            .bg(Self::GREEN)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error_badge() -> Style {
        Style::default()
            .bg(Self::RED)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    }

    // Task panel
    pub fn task_ok() -> Style {
        Style::default()
            .fg(Self::GREEN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn task_failed() -> Style {
        Style::default()
            .fg(Self::RED)
            .add_modifier(Modifier::BOLD)
    }

    pub fn task_selected() -> Style {
        Style::default().add_modifier(Modifier::REVERSED)
    }

    pub fn detail_label() -> Style {
        Style::default()
            .fg(Self::DARK_GRAY)
            .add_modifier(Modifier::BOLD)
    }

    // Key hints
    pub fn key() -> Style {
        Style::default()
            .fg(Self::CYAN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn key_desc() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }
}
