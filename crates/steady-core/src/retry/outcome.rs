//! Per-attempt outcome: success, retryable failure, or fatal failure.

use std::time::Duration;

use super::classify::{classify_http_status, classify_transport_error, parse_retry_after};
use super::policy::ErrorKind;
use crate::error::SteadyError;
use crate::transport::{HttpResponse, TransportError};

/// Longest response body kept in a `Client` error.
const ERROR_BODY_SNIPPET: usize = 512;

/// Result of exactly one HTTP exchange, after classification.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(HttpResponse),
    /// Transient failure; `server_hint` is the parsed `Retry-After`, if any.
    Retryable {
        error: SteadyError,
        server_hint: Option<Duration>,
    },
    Fatal(SteadyError),
}

impl AttemptOutcome {
    /// Classify the raw result of one attempt.
    pub fn from_exchange(result: Result<HttpResponse, TransportError>) -> Self {
        match result {
            Ok(resp) if resp.is_success() => AttemptOutcome::Success(resp),
            Ok(resp) => Self::from_failed_response(resp),
            Err(e) => match classify_transport_error(&e) {
                ErrorKind::Timeout => AttemptOutcome::Retryable {
                    error: SteadyError::Timeout(e),
                    server_hint: None,
                },
                _ => AttemptOutcome::Retryable {
                    error: SteadyError::Network(e),
                    server_hint: None,
                },
            },
        }
    }

    fn from_failed_response(resp: HttpResponse) -> Self {
        let status = resp.status;
        match classify_http_status(status) {
            ErrorKind::RateLimited => {
                let hint = parse_retry_after(&resp);
                AttemptOutcome::Retryable {
                    error: SteadyError::RateLimited { retry_after: hint },
                    server_hint: hint,
                }
            }
            ErrorKind::ServerError => AttemptOutcome::Retryable {
                error: SteadyError::Server { status },
                server_hint: None,
            },
            ErrorKind::ClientError => AttemptOutcome::Fatal(SteadyError::Client {
                status,
                body: resp.body_snippet(ERROR_BODY_SNIPPET),
            }),
            // Transport-level kinds never come from a status code.
            ErrorKind::Unknown | ErrorKind::Network | ErrorKind::Timeout => {
                AttemptOutcome::Fatal(SteadyError::Unknown {
                    status: Some(status),
                    detail: resp.body_snippet(ERROR_BODY_SNIPPET),
                })
            }
        }
    }

    /// Kind of a failed outcome; `None` for success.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::Retryable { error, .. } | AttemptOutcome::Fatal(error) => error.kind(),
        }
    }
}
