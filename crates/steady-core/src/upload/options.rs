use std::fmt;
use std::time::Duration;

use super::plan::UploadLimits;
use super::progress::ProgressObserver;

/// Descriptive fields sent with the initiate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    pub filename: String,
    pub content_type: Option<String>,
}

/// Per-upload settings. Immutable once handed to the orchestrator.
#[derive(Clone)]
pub struct FileUploadOptions {
    metadata: UploadMetadata,
    limits: UploadLimits,
    enable_concurrent_parts: bool,
    max_concurrent_parts: usize,
    part_timeout: Option<Duration>,
    observer: Option<ProgressObserver>,
}

/// Parts in flight at once when concurrency is enabled and nothing else is configured.
pub const DEFAULT_MAX_CONCURRENT_PARTS: usize = 3;

impl FileUploadOptions {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            metadata: UploadMetadata {
                filename: filename.into(),
                content_type: None,
            },
            limits: UploadLimits::default(),
            enable_concurrent_parts: true,
            max_concurrent_parts: DEFAULT_MAX_CONCURRENT_PARTS,
            part_timeout: None,
            observer: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = Some(content_type.into());
        self
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_concurrent_parts(mut self, enabled: bool) -> Self {
        self.enable_concurrent_parts = enabled;
        self
    }

    /// Upper bound on parts in flight; values below 1 are treated as 1.
    pub fn with_max_concurrent_parts(mut self, max: usize) -> Self {
        self.max_concurrent_parts = max.max(1);
        self
    }

    /// Deadline for each attempt of a part (or single-shot send) call.
    pub fn with_part_timeout(mut self, timeout: Duration) -> Self {
        self.part_timeout = Some(timeout);
        self
    }

    /// Observer called on every progress change. It must not block.
    pub fn with_progress(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn metadata(&self) -> &UploadMetadata {
        &self.metadata
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub fn enable_concurrent_parts(&self) -> bool {
        self.enable_concurrent_parts
    }

    pub fn max_concurrent_parts(&self) -> usize {
        self.max_concurrent_parts
    }

    /// Parts allowed in flight for this upload.
    pub fn effective_concurrency(&self) -> usize {
        if self.enable_concurrent_parts {
            self.max_concurrent_parts.max(1)
        } else {
            1
        }
    }

    pub fn part_timeout(&self) -> Option<Duration> {
        self.part_timeout
    }

    pub fn observer(&self) -> Option<&ProgressObserver> {
        self.observer.as_ref()
    }
}

impl fmt::Debug for FileUploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUploadOptions")
            .field("metadata", &self.metadata)
            .field("limits", &self.limits)
            .field("enable_concurrent_parts", &self.enable_concurrent_parts)
            .field("max_concurrent_parts", &self.max_concurrent_parts)
            .field("part_timeout", &self.part_timeout)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}
