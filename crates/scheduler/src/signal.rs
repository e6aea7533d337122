//! One-shot cancellation latch.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A latch that can be tripped once and awaited by any number of tasks.
#[derive(Debug, Default)]
pub(crate) struct CancelSignal {
    tripped: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Trip the latch. Returns `true` only for the call that tripped it.
    pub(crate) fn cancel(&self) -> bool {
        let first = !self.tripped.swap(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        first
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Resolves once the latch has been tripped.
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
