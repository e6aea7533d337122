//! Bounded scheduler for expensive asynchronous operations.
//!
//! Wraps any [`Operation`](ragloom_core::Operation) so that at most
//! `max_async` calls execute at once. Pending calls wait in a bounded queue
//! ordered by `(priority, submission order)`; a background loop keeps the
//! worker pool at full strength; shutdown cancels everything still pending.

mod queue;
pub mod scheduler;
mod signal;

pub use scheduler::{BoundedScheduler, CallOptions, PendingCall, SchedulerStats};

/// Why a scheduled call did not produce the operation's value.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError<E> {
    /// The queue stayed full for longer than the call's queue timeout.
    #[error("Scheduler queue is full")]
    QueueFull,

    /// The operation ran longer than the call's execution timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The caller or a shutdown cancelled the call before it finished.
    #[error("Call was cancelled")]
    Cancelled,

    /// The scheduler is shutting down and accepts no new calls.
    #[error("Scheduler is shutting down")]
    ShuttingDown,

    /// The operation panicked; the worker caught it and kept running.
    #[error("Worker fault: {0}")]
    WorkerFault(String),

    /// The operation's own error, unchanged.
    #[error(transparent)]
    Operation(E),
}

impl<E> ScheduleError<E> {
    /// The operation's own error, if that is what this is.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}
