//! Retry, backoff and rate-limit pacing.
//!
//! This module encapsulates error classification (transport failures,
//! throttling, server and client errors), exponential backoff with jitter,
//! and the per-client throttle record, so that the client facade and the
//! upload pipeline share one consistent policy.

mod backoff;
mod classify;
mod outcome;
mod policy;
mod rate_limit;
mod run;

pub use backoff::{backoff_delay, backoff_delay_with, exponential_delay};
pub use classify::{classify, classify_http_status, classify_transport_error, parse_retry_after};
pub use outcome::AttemptOutcome;
pub use policy::{ErrorKind, RetryConfig, RetryDecision};
pub use rate_limit::{RateLimitState, RateLimitTracker};
pub use run::{run_with_retry, RetryGovernor};
