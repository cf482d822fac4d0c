//! Graceful shutdown coordination.
//!
//! A [`ShutdownCoordinator`] is created once by the caller and handed to every
//! component that sleeps (the rate limiter, the retry engine) and to the
//! orchestrator, which checks it between items. There is no process-wide
//! registry: whoever builds the engine decides who may cancel it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Coordinates graceful shutdown across async tasks.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            is_shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Notifies all registered waiters exactly once.
    pub fn request_shutdown(&self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait_for_shutdown(&self) {
        // Register interest before re-checking the flag so a request landing
        // in between is not missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the
    /// sleep was cut short by a shutdown request.
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.run_until_shutdown(tokio::time::sleep(duration))
            .await
            .is_some()
    }

    /// Drive `future` to completion unless shutdown is requested first.
    pub async fn run_until_shutdown<F: Future>(&self, future: F) -> Option<F::Output> {
        if self.is_shutdown_requested() {
            return None;
        }
        tokio::select! {
            output = future => Some(output),
            _ = self.wait_for_shutdown() => None,
        }
    }
}
