//! Upload lifecycle states and the transitions allowed between them.

use std::fmt;

use super::progress::UploadStatus;

/// Phase of one upload.
///
/// `Planning → Initiating → Transmitting → Completing → Completed`, with
/// single-shot uploads going `Transmitting → Completed` directly. `Failed`
/// is reachable from any non-terminal state, `Cancelled` from
/// `Transmitting` and `Completing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Planning,
    Initiating,
    Transmitting,
    Completing,
    Completed,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Failed | UploadState::Cancelled)
    }

    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        match (self, next) {
            (Planning, Initiating)
            | (Initiating, Transmitting)
            | (Transmitting, Completing)
            | (Transmitting, Completed)
            | (Completing, Completed)
            | (Transmitting, Cancelled)
            | (Completing, Cancelled) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Status reported to progress observers while in this state.
    pub fn progress_status(self) -> UploadStatus {
        match self {
            UploadState::Planning | UploadState::Initiating => UploadStatus::Starting,
            UploadState::Transmitting => UploadStatus::Uploading,
            UploadState::Completing => UploadStatus::Completing,
            UploadState::Completed => UploadStatus::Completed,
            UploadState::Failed => UploadStatus::Failed,
            UploadState::Cancelled => UploadStatus::Cancelled,
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadState::Planning => "planning",
            UploadState::Initiating => "initiating",
            UploadState::Transmitting => "transmitting",
            UploadState::Completing => "completing",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
            UploadState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
