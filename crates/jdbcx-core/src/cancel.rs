//! Statement cancellation token (spec §5): every in-flight worker observes
//! the same token; propagating it into downstream calls is each
//! interpreter's job. Cancellation is idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Idempotent: cancelling an already-cancelled token is a no-op.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled. Polling rather than a
    /// notify-based wakeup keeps this dependency-free; statement lifetimes
    /// are short enough that the poll interval is not a performance concern.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
