//! Cooperative interruption of a run.
//!
//! A [`ShutdownCoordinator`] is shared between the Ctrl+C listener and the
//! pipeline. The first request is checked before each batch, so the batch in
//! flight finishes and is flushed. The second abandons that batch: units still
//! fetching are dropped and the rows already written are flushed once. Only a
//! third request exits without flushing.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Exit code of a run stopped by Ctrl+C
pub const EXIT_INTERRUPTED: i32 = 130;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

static GLOBAL_SHUTDOWN: OnceCell<SharedShutdown> = OnceCell::new();

/// Register a global shutdown handle so pipelines built without one find it.
pub fn set_global_shutdown(handle: SharedShutdown) {
    let _ = GLOBAL_SHUTDOWN.set(handle);
}

/// Retrieve the registered global shutdown handle, if available.
pub fn get_global_shutdown() -> Option<SharedShutdown> {
    GLOBAL_SHUTDOWN.get().cloned()
}

/// What a shutdown request amounts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// First request: finish and flush the current batch, then stop
    Graceful,
    /// Second request: abandon the current batch, flush what finished
    Abandon,
    /// Any later request: exit without flushing
    Forced,
}

/// Coordinates graceful shutdown across async tasks.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    requests: AtomicUsize,
    notify: Notify,
    abandon: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. The first request wakes [`wait_for_shutdown`], the
    /// second wakes [`wait_for_abandon`].
    ///
    /// [`wait_for_shutdown`]: Self::wait_for_shutdown
    /// [`wait_for_abandon`]: Self::wait_for_abandon
    pub fn request_shutdown(&self) -> ShutdownRequest {
        match self.requests.fetch_add(1, Ordering::SeqCst) {
            0 => {
                self.notify.notify_waiters();
                ShutdownRequest::Graceful
            }
            1 => {
                self.abandon.notify_waiters();
                ShutdownRequest::Abandon
            }
            _ => ShutdownRequest::Forced,
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.requests.load(Ordering::SeqCst) > 0
    }

    /// Whether the batch in flight should be abandoned.
    pub fn is_abandon_requested(&self) -> bool {
        self.requests.load(Ordering::SeqCst) > 1
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a request in between is not missed
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Wait for the second request. Returns immediately if it already arrived.
    pub async fn wait_for_abandon(&self) {
        let notified = self.abandon.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_abandon_requested() {
            return;
        }
        notified.await;
    }
}

/// Turn Ctrl+C into shutdown requests on `shutdown`.
///
/// The first press asks the run to stop after the current batch is flushed.
/// The second abandons the batch and lets the run flush what finished. The
/// third exits the process with [`EXIT_INTERRUPTED`] immediately.
pub fn listen_for_ctrl_c(shutdown: SharedShutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match shutdown.request_shutdown() {
                ShutdownRequest::Graceful => {
                    warn!("Ctrl+C received - finishing current batch, press again to abandon it");
                }
                ShutdownRequest::Abandon => {
                    warn!("Second Ctrl+C - abandoning current batch, flushing finished records");
                }
                ShutdownRequest::Forced => {
                    error!("Third Ctrl+C - exiting without flush");
                    std::process::exit(EXIT_INTERRUPTED);
                }
            }
        }
    })
}
