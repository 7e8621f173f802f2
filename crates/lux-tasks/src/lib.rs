// SPDX-License-Identifier: Apache-2.0
//! Cancellable background tasks with progress reporting.
//!
//! A task is an async closure spawned onto the runtime. It receives a
//! [`TaskContext`] through which it publishes progress and observes
//! cancellation; the spawner keeps a [`TaskHandle`] to request cancellation
//! and await the outcome. Completion travels over a oneshot channel, so the
//! outcome is delivered exactly once even when cancellation races the
//! task's own completion.

mod progress;
mod task;

pub use progress::{Progress, ProgressSnapshot};
pub use task::{spawn, CancelToken, TaskContext, TaskHandle, TaskOutcome};
