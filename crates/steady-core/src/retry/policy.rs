use std::time::Duration;

use super::backoff;

/// High-level classification of a failed exchange.
///
/// Every transport failure and every non-2xx status maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was obtained (connection reset, DNS, TLS, ...).
    Network,
    /// Server asked us to slow down (429).
    RateLimited,
    /// Transient server-side failure (500, 502, 503, 504).
    ServerError,
    /// The request itself is wrong or unauthorized (400, 401, 403, 404, 409).
    ClientError,
    /// The attempt ran past its deadline.
    Timeout,
    /// Anything else; not retried.
    Unknown,
}

impl ErrorKind {
    /// Whether the governor may retry this kind at all.
    pub fn is_retryable(self) -> bool {
        match self {
            ErrorKind::Network | ErrorKind::RateLimited | ErrorKind::ServerError | ErrorKind::Timeout => {
                true
            }
            ErrorKind::ClientError | ErrorKind::Unknown => false,
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Immutable retry parameters for one client or operation.
///
/// Built from [`RetryConfig::default`] and the `with_*` functions; there is no
/// way to change a value once it has been handed to a governor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    respect_server_hint: bool,
}

/// Largest accepted jitter factor; the range is half-open at 1.0.
const MAX_JITTER: f64 = 0.99;

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
            respect_server_hint: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config that never retries.
    pub fn no_retry() -> Self {
        Self::default().with_max_retries(0)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base delay; `max_delay` is raised to match if it would be smaller.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self.max_delay = self.max_delay.max(delay);
        self
    }

    /// Upper bound for any single wait; `base_delay` is lowered to match if larger.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self.base_delay = self.base_delay.min(delay);
        self
    }

    /// Jitter factor, clamped to `[0, 1)`. Non-finite values disable jitter.
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = if jitter.is_finite() {
            jitter.clamp(0.0, MAX_JITTER)
        } else {
            0.0
        };
        self
    }

    pub fn with_respect_server_hint(mut self, respect: bool) -> Self {
        self.respect_server_hint = respect;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts allowed for one logical call (first attempt included).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    pub fn respect_server_hint(&self) -> bool {
        self.respect_server_hint
    }

    /// Decide whether to retry after attempt number `attempt` (1-based) failed
    /// with `kind`.
    ///
    /// Returns `RetryDecision::NoRetry` when the kind is not retryable or the
    /// attempt budget is spent.
    pub fn decide(&self, attempt: u32, kind: ErrorKind, server_hint: Option<Duration>) -> RetryDecision {
        if attempt >= self.max_attempts() {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::ClientError | ErrorKind::Unknown => RetryDecision::NoRetry,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::ServerError => {
                RetryDecision::RetryAfter(backoff::backoff_delay(attempt, self, None))
            }
            ErrorKind::RateLimited => {
                RetryDecision::RetryAfter(backoff::backoff_delay(attempt, self, server_hint))
            }
        }
    }
}
