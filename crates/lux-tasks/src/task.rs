// SPDX-License-Identifier: Apache-2.0
//! Task spawning, cancellation, and outcome delivery.

use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use lux_proto::{codes, RpcError};
use tokio::sync::{oneshot, Notify};
use tracing::debug;

use crate::Progress;

/// Cooperative cancellation signal, cloneable across tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.inner.notify.notified().await;
        }
    }
}

/// What a task handed back, exactly once.
#[derive(Debug)]
pub enum TaskOutcome<R> {
    /// Completed with a result.
    Ok(R),
    /// Failed with a protocol error.
    Err(RpcError),
    /// Cancelled before completing.
    Cancelled,
}

impl<R> TaskOutcome<R> {
    /// Collapse into a `Result`, mapping cancellation to its error code.
    pub fn into_result(self) -> Result<R, RpcError> {
        match self {
            TaskOutcome::Ok(value) => Ok(value),
            TaskOutcome::Err(err) => Err(err),
            TaskOutcome::Cancelled => Err(RpcError::cancelled()),
        }
    }
}

/// Handed to the task body: progress write-side plus the cancel token.
#[derive(Clone)]
pub struct TaskContext {
    progress: Arc<Progress>,
    cancel: CancelToken,
}

impl TaskContext {
    /// Publish a progress update.
    pub fn progress(&self, operation: impl Into<String>, amount: f32) {
        self.progress.update(operation, amount);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Bail out with the cancellation error if cancellation was requested.
    /// Long-running loops call this at their checkpoints.
    pub fn ensure_active(&self) -> Result<(), RpcError> {
        if self.cancel.is_cancelled() {
            Err(RpcError::cancelled())
        } else {
            Ok(())
        }
    }
}

/// Observer side of a spawned task.
pub struct TaskHandle<R> {
    progress: Arc<Progress>,
    cancel: CancelToken,
    completion: oneshot::Receiver<TaskOutcome<R>>,
}

impl<R> TaskHandle<R> {
    /// The task's progress read-side.
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// The task's cancel token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation. The outcome still arrives through the
    /// completion channel.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await the outcome. A dropped sender counts as cancellation.
    pub async fn outcome(self) -> TaskOutcome<R> {
        match self.completion.await {
            Ok(outcome) => outcome,
            Err(_) => TaskOutcome::Cancelled,
        }
    }

    /// Tear into parts so progress polling, cancellation, and completion
    /// can live on different tasks.
    pub fn split(
        self,
    ) -> (
        Arc<Progress>,
        CancelToken,
        oneshot::Receiver<TaskOutcome<R>>,
    ) {
        (self.progress, self.cancel, self.completion)
    }
}

/// Spawn a task body onto the runtime.
///
/// The body races against the cancel token. A body that returns the
/// cancellation error code (from [`TaskContext::ensure_active`]) is folded
/// into [`TaskOutcome::Cancelled`] as well.
pub fn spawn<F, Fut, R>(work: F) -> TaskHandle<R>
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<R, RpcError>> + Send + 'static,
    R: Send + 'static,
{
    let progress = Arc::new(Progress::default());
    let cancel = CancelToken::new();
    let ctx = TaskContext {
        progress: Arc::clone(&progress),
        cancel: cancel.clone(),
    };
    let (tx, rx) = oneshot::channel();
    let race = cancel.clone();
    tokio::spawn(async move {
        let outcome = tokio::select! {
            biased;
            result = work(ctx) => match result {
                Ok(value) => TaskOutcome::Ok(value),
                Err(err) if err.code == codes::TASK_CANCELLED => TaskOutcome::Cancelled,
                Err(err) => TaskOutcome::Err(err),
            },
            () = race.cancelled() => {
                debug!("task cancelled before completion");
                TaskOutcome::Cancelled
            }
        };
        // receiver may be gone when the whole engine is shutting down
        let _ = tx.send(outcome);
    });
    TaskHandle {
        progress,
        cancel,
        completion: rx,
    }
}
