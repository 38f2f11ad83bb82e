//! Task registry and per-task view state
//!
//! The registry is read-only over one payload. Expand/collapse state lives
//! in a [`TaskViewState`] owned by whoever renders the turn and is passed
//! into the registry's queries.

use std::collections::BTreeMap;

use tracing::debug;

use super::payload::{ExtractedPayload, TaskResult};

/// Aggregate task counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskCounts {
    pub completed: u32,
    pub failed: u32,
    pub total: u32,
}

/// Expanded flags keyed by task ordinal. Absent means collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskViewState {
    expanded: BTreeMap<u32, bool>,
}

impl TaskViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, ordinal: u32) -> bool {
        self.expanded.get(&ordinal).copied().unwrap_or(false)
    }

    /// Ordinals that currently have an entry
    pub fn ordinals(&self) -> impl Iterator<Item = u32> + '_ {
        self.expanded.keys().copied()
    }

    pub fn expanded_count(&self) -> usize {
        self.expanded.values().filter(|v| **v).count()
    }
}

/// Read-only view over one extracted payload
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRegistry {
    payload: ExtractedPayload,
}

impl TaskRegistry {
    pub fn new(payload: ExtractedPayload) -> Self {
        let registry = Self { payload };
        if !registry.counts_consistent() {
            debug!(
                "Declared task counts {:?} differ from task list {:?}; keeping declared",
                registry.counts(),
                registry.recount()
            );
        }
        registry
    }

    /// Tasks in declared order
    pub fn tasks(&self) -> &[TaskResult] {
        &self.payload.tasks
    }

    pub fn task(&self, ordinal: u32) -> Option<&TaskResult> {
        self.payload.tasks.iter().find(|t| t.ordinal == ordinal)
    }

    pub fn contains(&self, ordinal: u32) -> bool {
        self.task(ordinal).is_some()
    }

    /// Counts exactly as the backend declared them
    pub fn counts(&self) -> TaskCounts {
        TaskCounts {
            completed: self.payload.completed_count,
            failed: self.payload.failed_count,
            total: self.payload.total_count,
        }
    }

    /// Counts derived from the task list itself
    pub fn recount(&self) -> TaskCounts {
        let completed = self.payload.tasks.iter().filter(|t| t.succeeded).count() as u32;
        let total = self.payload.tasks.len() as u32;
        TaskCounts {
            completed,
            failed: total - completed,
            total,
        }
    }

    pub fn counts_consistent(&self) -> bool {
        self.counts() == self.recount()
    }

    pub fn summary(&self) -> Option<&str> {
        self.payload.summary_text.as_deref()
    }

    pub fn executed(&self) -> bool {
        self.payload.executed
    }

    /// Only executed payloads with at least one task are shown
    pub fn is_displayable(&self) -> bool {
        self.executed() && !self.payload.tasks.is_empty()
    }

    pub fn payload(&self) -> &ExtractedPayload {
        &self.payload
    }

    /// Flip the expanded flag of `ordinal`. Returns the new value, or `None`
    /// when the payload has no such task (the state is left untouched).
    pub fn toggle(&self, state: &mut TaskViewState, ordinal: u32) -> Option<bool> {
        if !self.contains(ordinal) {
            debug!("Ignoring toggle for unknown task #{}", ordinal);
            return None;
        }
        let flag = state.expanded.entry(ordinal).or_insert(false);
        *flag = !*flag;
        Some(*flag)
    }

    pub fn is_expanded(&self, state: &TaskViewState, ordinal: u32) -> bool {
        self.contains(ordinal) && state.is_expanded(ordinal)
    }

    pub fn expand_all(&self, state: &mut TaskViewState) {
        for task in &self.payload.tasks {
            state.expanded.insert(task.ordinal, true);
        }
    }

    pub fn collapse_all(&self, state: &mut TaskViewState) {
        state.expanded.clear();
    }
}
