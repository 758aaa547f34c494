//! Single-assignment future slot.
//!
//! All coordination in the execution graph goes through [`Deferred`]: a
//! write-once, multi-waiter cell. There are no locks anywhere in the engine -
//! a slot is completed at most once and every waiter observes the same value,
//! which is what makes dead/terminal propagation race-free by construction.

use std::sync::Arc;
use std::sync::OnceLock;

use tokio::sync::Notify;

struct Inner<T> {
    cell: OnceLock<T>,
    notify: Notify,
}

/// A future slot that is completed exactly once and awaited any number of
/// times.
///
/// [`complete`](Self::complete) returns whether this call won the assignment;
/// completing an already-completed slot is a no-op, not an error. That single
/// property carries both the idempotent drain and the detection of duplicate
/// terminal completions.
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deferred<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cell: OnceLock::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Complete the slot. Returns `false` if it was already completed; the
    /// original value is kept.
    pub fn complete(&self, value: T) -> bool {
        let won = self.inner.cell.set(value).is_ok();
        if won {
            self.inner.notify.notify_waiters();
        }
        won
    }

    /// Read the value without waiting.
    #[must_use]
    pub fn try_get(&self) -> Option<&T> {
        self.inner.cell.get()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.cell.get().is_some()
    }
}

impl<T: Clone> Deferred<T> {
    /// Wait until the slot is completed and return a clone of its value.
    pub async fn wait(&self) -> T {
        loop {
            // Register interest before checking, so a completion landing
            // between the check and the await cannot be missed.
            let mut notified = std::pin::pin!(self.inner.notify.notified());
            let _ = notified.as_mut().enable();
            if let Some(value) = self.inner.cell.get() {
                return value.clone();
            }
            notified.await;
        }
    }
}
