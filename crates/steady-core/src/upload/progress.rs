//! Progress aggregation for uploads (bytes done, parts, status, rate).
//!
//! Part transmitters report completed parts here; the aggregator keeps a
//! monotonic byte count and hands a fresh [`FileUploadProgress`] snapshot to
//! the caller's observer on every change.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use super::parts::PartSet;

/// Caller-visible phase of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Starting,
    Uploading,
    Completing,
    Completed,
    Failed,
    Cancelled,
}

/// Snapshot of upload progress.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUploadProgress {
    /// Bytes of acknowledged parts.
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    /// Furthest part scheduled so far (multi-part only).
    pub current_part: Option<u32>,
    pub total_parts: Option<u32>,
    pub status: UploadStatus,
    /// Time since the aggregator was created.
    pub elapsed: Duration,
}

impl FileUploadProgress {
    /// `uploaded / total * 100`; 0 when the total is 0.
    pub fn progress_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.uploaded_bytes as f64 / self.total_bytes as f64 * 100.0).min(100.0)
    }

    /// Average upload rate in bytes per second (0 if no time has passed).
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.uploaded_bytes as f64 / secs
    }

    /// Estimated time remaining (None while the rate is unknown).
    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.total_bytes.saturating_sub(self.uploaded_bytes);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}

/// Observer invoked synchronously on every progress change.
///
/// Runs on the part-completion path: it must return quickly and must not block.
pub type ProgressObserver = Arc<dyn Fn(&FileUploadProgress) + Send + Sync>;

struct Inner {
    uploaded_bytes: u64,
    current_part: Option<u32>,
    status: UploadStatus,
    completed: PartSet,
}

/// Thread-safe accumulator of per-part byte counts.
pub struct ProgressAggregator {
    total_bytes: u64,
    total_parts: Option<u32>,
    started: Instant,
    inner: Mutex<Inner>,
    observer: Option<ProgressObserver>,
}

impl fmt::Debug for ProgressAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressAggregator")
            .field("total_bytes", &self.total_bytes)
            .field("total_parts", &self.total_parts)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl ProgressAggregator {
    /// `total_parts` is `None` for single-shot uploads (tracked as one part internally).
    pub fn new(total_bytes: u64, total_parts: Option<u32>, observer: Option<ProgressObserver>) -> Self {
        Self {
            total_bytes,
            total_parts,
            started: Instant::now(),
            inner: Mutex::new(Inner {
                uploaded_bytes: 0,
                current_part: None,
                status: UploadStatus::Starting,
                completed: PartSet::new(total_parts.unwrap_or(1)),
            }),
            observer,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot_of(&self, inner: &Inner) -> FileUploadProgress {
        FileUploadProgress {
            uploaded_bytes: inner.uploaded_bytes,
            total_bytes: self.total_bytes,
            current_part: inner.current_part,
            total_parts: self.total_parts,
            status: inner.status,
            elapsed: self.started.elapsed(),
        }
    }

    fn notify(&self, snapshot: &FileUploadProgress) {
        if let Some(observer) = &self.observer {
            observer(snapshot);
        }
    }

    /// Record that `part_number` was handed to a transmitter.
    pub fn mark_scheduled(&self, part_number: u32) {
        let mut inner = self.lock();
        inner.current_part = Some(inner.current_part.map_or(part_number, |c| c.max(part_number)));
    }

    /// Add the bytes of an acknowledged part.
    ///
    /// Returns false (and changes nothing) when the part was already counted
    /// or is not part of this upload. The total never exceeds `total_bytes`.
    pub fn record_part_complete(&self, part_number: u32, bytes: u64) -> bool {
        let snapshot = {
            let mut inner = self.lock();
            if !inner.completed.insert(part_number) {
                tracing::debug!(part_number, "ignoring duplicate or unknown part completion");
                return false;
            }
            inner.uploaded_bytes = inner.uploaded_bytes.saturating_add(bytes).min(self.total_bytes);
            self.snapshot_of(&inner)
        };
        self.notify(&snapshot);
        true
    }

    /// Change the reported status and notify the observer.
    pub fn set_status(&self, status: UploadStatus) {
        let snapshot = {
            let mut inner = self.lock();
            if inner.status == status {
                return;
            }
            inner.status = status;
            self.snapshot_of(&inner)
        };
        self.notify(&snapshot);
    }

    pub fn snapshot(&self) -> FileUploadProgress {
        let inner = self.lock();
        self.snapshot_of(&inner)
    }
}
