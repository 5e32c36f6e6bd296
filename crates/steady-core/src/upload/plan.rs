//! Upload planning: single-shot vs multi-part, part size and boundaries.

use crate::error::SteadyError;

const MIB: u64 = 1024 * 1024;

/// Size constraints of the upload endpoint.
///
/// These belong to the wrapped API, so they are passed in rather than derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Smallest allowed part (every part except the last).
    pub min_part_size: u64,
    /// Largest allowed part.
    pub max_part_size: u64,
    /// Most parts one upload may have.
    pub max_parts: u32,
    /// Payloads of at least this many bytes are sent in parts.
    pub multipart_threshold: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            min_part_size: 5 * MIB,
            max_part_size: 20 * MIB,
            max_parts: 1000,
            multipart_threshold: 20 * MIB,
        }
    }
}

impl UploadLimits {
    pub fn with_min_part_size(mut self, bytes: u64) -> Self {
        self.min_part_size = bytes;
        self
    }

    pub fn with_max_part_size(mut self, bytes: u64) -> Self {
        self.max_part_size = bytes;
        self
    }

    pub fn with_max_parts(mut self, parts: u32) -> Self {
        self.max_parts = parts;
        self
    }

    pub fn with_multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = bytes;
        self
    }

    fn validate(&self) -> Result<(), SteadyError> {
        if self.min_part_size == 0 {
            return Err(SteadyError::Validation("minimum part size must be > 0".into()));
        }
        if self.max_parts == 0 {
            return Err(SteadyError::Validation("maximum part count must be > 0".into()));
        }
        if self.min_part_size > self.max_part_size {
            return Err(SteadyError::Validation(format!(
                "minimum part size {} exceeds maximum part size {}",
                self.min_part_size, self.max_part_size
            )));
        }
        Ok(())
    }
}

/// Transfer mode chosen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Single,
    MultiPart,
}

/// How a payload will be sent.
///
/// Invariant: `part_size * (part_count - 1) < total_bytes <= part_size * part_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPlan {
    pub total_bytes: u64,
    pub mode: UploadMode,
    pub part_size: u64,
    pub part_count: u32,
}

/// One part: 1-based number and half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub number: u32,
    pub start: u64,
    pub end: u64,
}

impl PartRange {
    /// Length of this part in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UploadPlan {
    pub fn is_multipart(&self) -> bool {
        self.mode == UploadMode::MultiPart
    }

    /// Range of part `number` (1-based), or None when out of range.
    pub fn part(&self, number: u32) -> Option<PartRange> {
        if number == 0 || number > self.part_count {
            return None;
        }
        let start = u64::from(number - 1) * self.part_size;
        let end = (start + self.part_size).min(self.total_bytes);
        Some(PartRange { number, start, end })
    }

    /// All parts in order. They cover `[0, total_bytes)` with no gap or overlap.
    pub fn parts(&self) -> impl Iterator<Item = PartRange> + '_ {
        (1..=self.part_count).filter_map(move |n| self.part(n))
    }
}

/// Build an upload plan for `total_bytes` under `limits`.
///
/// Deterministic: identical inputs always give an identical plan.
pub fn plan_upload(total_bytes: u64, limits: &UploadLimits) -> Result<UploadPlan, SteadyError> {
    if total_bytes == 0 {
        return Err(SteadyError::Validation("cannot upload an empty payload".into()));
    }
    limits.validate()?;

    if total_bytes < limits.multipart_threshold {
        return Ok(UploadPlan {
            total_bytes,
            mode: UploadMode::Single,
            part_size: total_bytes,
            part_count: 1,
        });
    }

    // Smallest part size that still fits under the part-count ceiling.
    let needed = total_bytes.div_ceil(u64::from(limits.max_parts));
    let part_size = limits.min_part_size.max(needed);
    if part_size > limits.max_part_size {
        return Err(SteadyError::Validation(format!(
            "{} bytes needs parts of {} bytes to stay within {} parts; maximum part size is {}",
            total_bytes, part_size, limits.max_parts, limits.max_part_size
        )));
    }
    let part_count = total_bytes.div_ceil(part_size);
    let part_count = u32::try_from(part_count).map_err(|_| {
        SteadyError::Validation(format!("part count {} out of range", part_count))
    })?;

    Ok(UploadPlan {
        total_bytes,
        mode: UploadMode::MultiPart,
        part_size,
        part_count,
    })
}
