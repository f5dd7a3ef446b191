//! Cooperative cancellation for a top-level crawl
//!
//! The stop signal is polled by the engine before each child and by
//! discovery producers before each offer. Nothing is preempted. Once the
//! top-level call has drained, the engine settles the token so callers
//! waiting in [`CancellationToken::cancel_and_wait`] are released.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared, monotonic stop signal
#[derive(Debug, Clone)]
pub struct CancellationToken {
    stop: tokio_util::sync::CancellationToken,
    settled: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (settled, _) = watch::channel(false);
        Self {
            stop: tokio_util::sync::CancellationToken::new(),
            settled: Arc::new(settled),
        }
    }

    /// Requests cancellation; the token can never be cleared again
    pub fn cancel(&self) {
        self.stop.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Completes once cancellation has been requested
    pub async fn cancelled(&self) {
        self.stop.cancelled().await
    }

    /// A token for one nested crawl
    ///
    /// Cancelling `self` cancels the child, never the reverse. The child
    /// settles on its own.
    pub fn child(&self) -> Self {
        let (settled, _) = watch::channel(false);
        Self {
            stop: self.stop.child_token(),
            settled: Arc::new(settled),
        }
    }

    /// Marks the crawl owning this token as finished
    pub fn settle(&self) {
        self.settled.send_replace(true);
    }

    pub fn is_settled(&self) -> bool {
        *self.settled.borrow()
    }

    /// Waits until the crawl owning this token has settled
    pub async fn wait_settled(&self) {
        let mut rx = self.settled.subscribe();
        // The sender lives in self, so the channel cannot close under us.
        let _ = rx.wait_for(|settled| *settled).await;
    }

    /// Cancels and waits for in-flight work to drain
    pub async fn cancel_and_wait(&self) {
        self.cancel();
        self.wait_settled().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
