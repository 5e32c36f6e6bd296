//! Upload control: a shared cancel token checked by the orchestrator.
//!
//! Cancelling stops new parts from being scheduled; parts already dispatched
//! are left to settle and the upload then ends as `Cancelled`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clone-able cancel handle. All clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct UploadControl {
    cancelled: Arc<AtomicBool>,
}

impl UploadControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("upload cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
