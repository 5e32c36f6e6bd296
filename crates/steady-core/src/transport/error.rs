//! Transport-level failures: no HTTP response was obtained.

use std::time::Duration;
use thiserror::Error;

/// A failure to complete one HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// libcurl reported an error (connect, DNS, send/recv, low-speed timeout, ...).
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    /// The attempt exceeded its per-attempt deadline.
    #[error("no response within {0:?}")]
    TimedOut(Duration),
    /// Connection-level failure reported by a non-curl transport.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The blocking worker running the transfer panicked or was cancelled.
    #[error("transport worker failed: {0}")]
    Worker(String),
}

impl TransportError {
    /// True when the failure is a deadline rather than a broken connection.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Curl(e) => e.is_operation_timedout(),
            TransportError::TimedOut(_) => true,
            TransportError::Connection(_) | TransportError::Worker(_) => false,
        }
    }
}
