//! Terminal User Interface module
//!
//! Chat view over the prediction endpoint with collapsible diagnostic tasks.

mod app;
mod input;
mod shimmer;
mod status;
mod theme;
mod widgets;

pub use app::{App, Focus};
pub use input::{InputAction, InputState};
pub use status::{status_text_for, ProcessingTimer};
pub use theme::Theme;
pub use widgets::{document_lines, render_entry_lines, task_block_lines};
