//! # Cancellation Signal
//!
//! A caller-owned signal passed by reference into every operation that may
//! suspend on an external collaborator. Cancelling is idempotent and
//! visible to all clones.
//!
//! [`CancellationSignal::guard()`] races a future against the signal, so a
//! pending key lookup, signature, or remote proof call is dropped as soon as
//! the caller gives up. Nothing in this workspace writes persistent state,
//! so dropping a pending call leaves no partial effects behind.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::Cancelled;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag shared between a caller and the work it
/// started.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    /// A fresh, uncancelled signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation has been requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel()
            // between the check and the await is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `fut` unless cancellation fires first.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, Cancelled>
    where
        F: Future<Output = T>,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.cancelled() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_is_visible_to_clones() {
        let a = CancellationSignal::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
        assert_eq!(b.check(), Err(Cancelled));
        a.cancel();
        assert!(a.is_cancelled());
    }

    #[tokio::test]
    async fn guard_passes_through_when_not_cancelled() {
        let signal = CancellationSignal::new();
        assert_eq!(signal.guard(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn guard_rejects_already_cancelled() {
        let signal = CancellationSignal::new();
        signal.cancel();
        assert_eq!(signal.guard(async { 7 }).await, Err(Cancelled));
    }

    #[tokio::test]
    async fn guard_aborts_pending_future() {
        let signal = CancellationSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let out = signal
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                1
            })
            .await;
        assert_eq!(out, Err(Cancelled));
    }

    #[tokio::test]
    async fn cancelled_resolves_for_late_waiters() {
        let signal = CancellationSignal::new();
        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .unwrap();
    }
}
