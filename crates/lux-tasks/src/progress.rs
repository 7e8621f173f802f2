// SPDX-License-Identifier: Apache-2.0
//! Shared progress state between a running task and its observer.

use std::sync::{Mutex, PoisonError};

/// Point-in-time view of a task's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Human-readable description of the current phase.
    pub operation: String,
    /// Completed fraction in `[0, 1]`.
    pub amount: f32,
}

#[derive(Debug, Default)]
struct State {
    operation: String,
    amount: f32,
    dirty: bool,
    finished: bool,
}

/// Write-side updated by the task, read-side drained by a notifier.
///
/// Updates coalesce: a reader polling `consume` sees only the latest state,
/// never a backlog. Tasks update as often as they like.
#[derive(Debug, Default)]
pub struct Progress {
    state: Mutex<State>,
}

impl Progress {
    /// Record the current phase and completed fraction.
    pub fn update(&self, operation: impl Into<String>, amount: f32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            return;
        }
        state.operation = operation.into();
        state.amount = amount.clamp(0.0, 1.0);
        state.dirty = true;
    }

    /// Force the terminal 100% update. Later updates are ignored; calling
    /// again is a no-op, so the terminal state is published exactly once.
    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            return;
        }
        state.operation = "Done".to_owned();
        state.amount = 1.0;
        state.dirty = true;
        state.finished = true;
    }

    /// Take the latest unseen update, if any.
    pub fn consume(&self) -> Option<ProgressSnapshot> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.dirty {
            return None;
        }
        state.dirty = false;
        Some(ProgressSnapshot {
            operation: state.operation.clone(),
            amount: state.amount,
        })
    }

    /// Current state regardless of whether it was already consumed.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        ProgressSnapshot {
            operation: state.operation.clone(),
            amount: state.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_drains_only_once() {
        let progress = Progress::default();
        assert!(progress.consume().is_none());

        progress.update("loading", 0.25);
        let snap = progress.consume().expect("unseen update");
        assert_eq!(snap.operation, "loading");
        assert!((snap.amount - 0.25).abs() < f32::EPSILON);
        assert!(progress.consume().is_none());
    }

    #[test]
    fn updates_coalesce_to_latest() {
        let progress = Progress::default();
        progress.update("a", 0.1);
        progress.update("b", 0.9);
        let snap = progress.consume().expect("unseen update");
        assert_eq!(snap.operation, "b");
    }

    #[test]
    fn finish_is_terminal_and_exactly_once() {
        let progress = Progress::default();
        progress.update("almost", 0.9);
        progress.finish();
        let snap = progress.consume().expect("terminal update");
        assert_eq!(snap.operation, "Done");
        assert!((snap.amount - 1.0).abs() < f32::EPSILON);

        // further updates and repeat finishes are ignored
        progress.update("zombie", 0.1);
        progress.finish();
        assert!(progress.consume().is_none());
        assert_eq!(progress.snapshot().operation, "Done");
    }

    #[test]
    fn amount_is_clamped() {
        let progress = Progress::default();
        progress.update("over", 1.5);
        assert!((progress.snapshot().amount - 1.0).abs() < f32::EPSILON);
    }
}
