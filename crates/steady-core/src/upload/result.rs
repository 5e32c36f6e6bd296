//! Terminal result of an upload.

use std::time::Duration;

use super::plan::UploadPlan;
use super::progress::FileUploadProgress;
use super::state::UploadState;
use crate::error::SteadyError;

#[derive(Debug)]
pub struct UploadSuccess {
    pub session_id: String,
    pub elapsed: Duration,
    pub progress: FileUploadProgress,
    pub plan: UploadPlan,
}

#[derive(Debug)]
pub struct UploadFailure {
    /// Phase that was running when the upload stopped.
    pub phase: UploadState,
    pub error: SteadyError,
    /// Exchanges made by the call that failed (0 for local failures).
    pub attempts: u32,
    /// Progress at the moment of failure; None if it failed before planning finished.
    pub progress: Option<FileUploadProgress>,
}

#[derive(Debug)]
pub enum UploadResult {
    Success(UploadSuccess),
    Failure(UploadFailure),
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success(_))
    }

    /// Terminal state the upload ended in.
    pub fn final_state(&self) -> UploadState {
        match self {
            UploadResult::Success(_) => UploadState::Completed,
            UploadResult::Failure(f) if matches!(f.error, SteadyError::Cancelled) => UploadState::Cancelled,
            UploadResult::Failure(_) => UploadState::Failed,
        }
    }

    pub fn error(&self) -> Option<&SteadyError> {
        match self {
            UploadResult::Success(_) => None,
            UploadResult::Failure(f) => Some(&f.error),
        }
    }

    /// Convert into a plain `Result`, dropping the failure context.
    pub fn into_result(self) -> Result<UploadSuccess, SteadyError> {
        match self {
            UploadResult::Success(s) => Ok(s),
            UploadResult::Failure(f) => Err(f.error),
        }
    }
}
