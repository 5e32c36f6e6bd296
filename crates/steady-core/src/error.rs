//! Errors surfaced to callers.

use std::time::Duration;
use thiserror::Error;

use crate::retry::ErrorKind;
use crate::transport::TransportError;

/// Terminal error of a call or an upload.
///
/// Every variant produced from an HTTP exchange maps to exactly one
/// [`ErrorKind`]; purely local failures (validation, cancellation, reading the
/// payload) have no kind.
#[derive(Debug, Error)]
pub enum SteadyError {
    #[error("network error: {0}")]
    Network(#[source] TransportError),
    #[error("rate limited by server (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error: HTTP {status}")]
    Server { status: u16 },
    #[error("request rejected: HTTP {status}: {body}")]
    Client { status: u16, body: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("timed out: {0}")]
    Timeout(#[source] TransportError),
    #[error("part {part_number} failed: {source}")]
    PartUpload {
        part_number: u32,
        #[source]
        source: Box<SteadyError>,
    },
    #[error("upload cancelled")]
    Cancelled,
    #[error("reading upload payload failed: {0}")]
    Source(#[from] std::io::Error),
    #[error("unexpected response (status {status:?}): {detail}")]
    Unknown { status: Option<u16>, detail: String },
}

impl SteadyError {
    /// Classification of this error, if it came from an HTTP exchange.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SteadyError::Network(_) => Some(ErrorKind::Network),
            SteadyError::RateLimited { .. } => Some(ErrorKind::RateLimited),
            SteadyError::Server { .. } => Some(ErrorKind::ServerError),
            SteadyError::Client { .. } => Some(ErrorKind::ClientError),
            SteadyError::Timeout(_) => Some(ErrorKind::Timeout),
            SteadyError::Unknown { .. } => Some(ErrorKind::Unknown),
            SteadyError::PartUpload { source, .. } => source.kind(),
            SteadyError::Validation(_) | SteadyError::Cancelled | SteadyError::Source(_) => None,
        }
    }

    /// True when retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind().map(ErrorKind::is_retryable).unwrap_or(false)
    }

    /// Server-supplied wait, when the server sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SteadyError::RateLimited { retry_after } => *retry_after,
            SteadyError::PartUpload { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    /// HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SteadyError::RateLimited { .. } => Some(429),
            SteadyError::Server { status } | SteadyError::Client { status, .. } => Some(*status),
            SteadyError::Unknown { status, .. } => *status,
            SteadyError::PartUpload { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// A call that ended without a successful response.
///
/// `error` is the last error observed; `attempts` counts every exchange made
/// for the call (0 when it failed before sending anything).
#[derive(Debug, Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct CallFailure {
    #[source]
    pub error: SteadyError,
    pub attempts: u32,
}

impl CallFailure {
    pub fn new(error: SteadyError, attempts: u32) -> Self {
        Self { error, attempts }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.error.kind()
    }
}

impl From<CallFailure> for SteadyError {
    fn from(f: CallFailure) -> Self {
        f.error
    }
}
