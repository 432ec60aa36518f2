//! Cooperative cancellation for build contexts.
//!
//! Every [`CancelSignal::cancel`] bumps an epoch. A build pass takes a
//! [`CancelToken`] when it starts and is cancelled once the epoch moves past
//! the one it captured, so cancelling with nothing in flight has no effect on
//! later passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    epoch: AtomicU64,
    notify: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    shared: Arc<Shared>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a pass starting now.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            shared: Arc::clone(&self.shared),
            epoch: self.shared.epoch.load(Ordering::Acquire),
        }
    }

    /// Cancel every pass currently holding a token.
    pub fn cancel(&self) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        self.shared.notify.notify_waiters();
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    shared: Arc<Shared>,
    epoch: u64,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.shared.epoch.load(Ordering::Acquire) != self.epoch
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
