//! Bounded priority queue shared by the submitters and the workers.
//!
//! Entries pop in `(priority ascending, sequence ascending)` order. Capacity
//! is a semaphore: a permit is consumed on `put` and returned on `pop`, so a
//! full queue parks submitters until a worker takes something.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

use crate::signal::CancelSignal;

/// Anything the queue can order.
pub(crate) trait Ranked {
    fn priority(&self) -> i64;
    fn sequence(&self) -> u64;
}

/// Heap adapter that turns the max-heap into a `(priority, sequence)` min-heap.
struct Slot<T>(T);

impl<T: Ranked> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl<T: Ranked> Eq for Slot<T> {}

impl<T: Ranked> Ord for Slot<T> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (other.0.priority(), other.0.sequence()).cmp(&(self.0.priority(), self.0.sequence()))
    }
}

impl<T: Ranked> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Why `put` gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejected {
    /// No slot opened within the queue timeout.
    Full,
    /// Shutdown began before the entry could be queued.
    Closed,
}

pub(crate) struct CallQueue<T> {
    heap: Mutex<BinaryHeap<Slot<T>>>,
    slots: Semaphore,
    items: Notify,
    /// Entries put but not yet marked done.
    unfinished: AtomicUsize,
    idle: Notify,
}

impl<T: Ranked> CallQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            slots: Semaphore::new(capacity.clamp(1, Semaphore::MAX_PERMITS)),
            items: Notify::new(),
            unfinished: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    fn heap(&self) -> MutexGuard<'_, BinaryHeap<Slot<T>>> {
        self.heap.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `entry`, waiting for a free slot for at most `wait` (forever when `None`).
    ///
    /// The shutdown latch is checked under the heap lock, so nothing can be
    /// queued after a shutdown has drained the heap.
    pub(crate) async fn put(
        &self,
        entry: T,
        wait: Option<Duration>,
        shutdown: &CancelSignal,
    ) -> Result<(), Rejected> {
        let acquire = async {
            tokio::select! {
                permit = self.slots.acquire() => permit.ok(),
                _ = shutdown.cancelled() => None,
            }
        };
        let permit = match wait {
            Some(limit) => tokio::time::timeout(limit, acquire)
                .await
                .map_err(|_| Rejected::Full)?,
            None => acquire.await,
        }
        .ok_or(Rejected::Closed)?;

        let mut heap = self.heap();
        if shutdown.is_cancelled() {
            return Err(Rejected::Closed);
        }
        permit.forget();
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        heap.push(Slot(entry));
        drop(heap);
        self.items.notify_one();
        Ok(())
    }

    /// Take the most urgent entry, waiting until one is available.
    ///
    /// Cancel-safe: an entry is only removed in the same poll that returns it.
    pub(crate) async fn pop(&self) -> T {
        loop {
            let notified = self.items.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.heap().pop();
            if let Some(Slot(entry)) = next {
                self.slots.add_permits(1);
                return entry;
            }
            notified.await;
        }
    }

    /// Mark one popped entry as fully handled.
    pub(crate) fn task_done(&self) {
        self.finish(1);
    }

    /// Remove every queued entry, in priority order.
    pub(crate) fn drain(&self) -> Vec<T> {
        let drained = std::mem::take(&mut *self.heap()).into_sorted_vec();
        // into_sorted_vec is ascending by Slot order, i.e. least urgent first.
        let entries: Vec<T> = drained.into_iter().rev().map(|Slot(e)| e).collect();
        if !entries.is_empty() {
            self.slots.add_permits(entries.len());
            self.finish(entries.len());
        }
        entries
    }

    /// Resolves once every queued entry has been popped and marked done.
    pub(crate) async fn join(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.heap().len()
    }

    fn finish(&self, n: usize) {
        let before = self.unfinished.fetch_sub(n, Ordering::SeqCst);
        if before == n {
            self.idle.notify_waiters();
        }
    }
}
