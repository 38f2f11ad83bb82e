//! Elapsed-time status for an outstanding request

use std::time::{Duration, Instant};

/// Monotonic timer started when a request is sent
#[derive(Debug, Clone, Copy)]
pub struct ProcessingTimer {
    started: Instant,
}

impl ProcessingTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn status_text(&self) -> String {
        status_text_for(self.elapsed())
    }
}

/// Status line text for a request that has been running for `elapsed`
pub fn status_text_for(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    match secs {
        0..=9 => "Analyzing your issue...".to_string(),
        10..=29 => format!("Analyzing your issue... ({secs}s)"),
        30..=119 => format!("Still working, reasoning models can take up to 2 minutes ({secs}s)"),
        _ => format!("Taking longer than usual ({}m {}s)", secs / 60, secs % 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_stages() {
        assert_eq!(status_text_for(Duration::from_secs(3)), "Analyzing your issue...");
        assert_eq!(
            status_text_for(Duration::from_millis(12_900)),
            "Analyzing your issue... (12s)"
        );
        assert_eq!(
            status_text_for(Duration::from_secs(45)),
            "Still working, reasoning models can take up to 2 minutes (45s)"
        );
        assert_eq!(
            status_text_for(Duration::from_secs(135)),
            "Taking longer than usual (2m 15s)"
        );
    }

    #[test]
    fn test_timer_is_monotonic() {
        let timer = ProcessingTimer::start();
        let first = timer.elapsed();
        assert!(timer.elapsed() >= first);
        assert_eq!(timer.status_text(), "Analyzing your issue...");
    }
}
