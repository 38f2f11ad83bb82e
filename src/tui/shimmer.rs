//! Loading animations: shimmer sweep over text, spinner, progress bar

use ratatui::style::{Modifier, Style};
use ratatui::text::Span;
use std::time::Duration;

const SWEEP_SECONDS: f32 = 2.0;
const PADDING: usize = 10;
const BAND_HALF_WIDTH: f32 = 5.0;

/// Shimmer-animated spans for `text`, phase taken from `elapsed`
pub fn shimmer_spans(text: &str, elapsed: Duration) -> Vec<Span<'static>> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let period = chars.len() + PADDING * 2;
    let pos = ((elapsed.as_secs_f32() % SWEEP_SECONDS) / SWEEP_SECONDS * period as f32) as isize;

    chars
        .iter()
        .enumerate()
        .map(|(i, ch)| {
            let dist = (i as isize + PADDING as isize - pos).abs() as f32;
            let intensity = if dist <= BAND_HALF_WIDTH {
                let x = std::f32::consts::PI * (dist / BAND_HALF_WIDTH);
                0.5 * (1.0 + x.cos())
            } else {
                0.0
            };
            Span::styled(ch.to_string(), style_for_intensity(intensity))
        })
        .collect()
}

fn style_for_intensity(intensity: f32) -> Style {
    if intensity < 0.2 {
        Style::default().add_modifier(Modifier::DIM)
    } else if intensity < 0.6 {
        Style::default()
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    }
}

/// Braille spinner for the status line
pub struct AnimatedDots {
    frame: usize,
}

impl AnimatedDots {
    const FRAMES: &'static [&'static str] = &[
        "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"
    ];

    pub fn new(frame: usize) -> Self {
        Self { frame }
    }

    pub fn current(&self) -> &'static str {
        Self::FRAMES[self.frame % Self::FRAMES.len()]
    }
}

/// Text progress bar, used for the completed/total task ratio
pub struct ProgressBar;

impl ProgressBar {
    const FULL: char = '█';
    const EMPTY: char = '░';
    const PARTIAL: [char; 8] = ['▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

    pub fn render(progress: f32, width: usize) -> String {
        let progress = progress.clamp(0.0, 1.0);
        let filled = (progress * width as f32) as usize;
        let partial_idx = ((progress * width as f32 - filled as f32) * 8.0) as usize;

        (0..width)
            .map(|i| {
                if i < filled {
                    Self::FULL
                } else if i == filled && partial_idx > 0 {
                    Self::PARTIAL[partial_idx.min(7)]
                } else {
                    Self::EMPTY
                }
            })
            .collect()
    }

    /// Bar for `done` out of `total`; an empty total renders as empty
    pub fn ratio(done: u32, total: u32, width: usize) -> String {
        if total == 0 {
            return Self::render(0.0, width);
        }
        Self::render(done as f32 / total as f32, width)
    }
}
