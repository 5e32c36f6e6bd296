//! Exponential backoff with multiplicative jitter.

use rand::Rng;
use std::time::Duration;

use super::policy::RetryConfig;

/// Wait before retry number `attempt` (1 = first retry).
///
/// A server hint, when honoured, is used as-is (capped at `max_delay`).
/// Otherwise `base * 2^(attempt-1)` capped at `max_delay`, then scaled by
/// `1 + U(-jitter, +jitter)` and clamped to `[0, max_delay]`.
pub fn backoff_delay(attempt: u32, config: &RetryConfig, server_hint: Option<Duration>) -> Duration {
    backoff_delay_with(&mut rand::thread_rng(), attempt, config, server_hint)
}

/// Same as [`backoff_delay`] with an explicit random source.
pub fn backoff_delay_with<R: Rng>(
    rng: &mut R,
    attempt: u32,
    config: &RetryConfig,
    server_hint: Option<Duration>,
) -> Duration {
    let max = config.max_delay();
    if config.respect_server_hint() {
        if let Some(hint) = server_hint {
            return hint.min(max);
        }
    }

    let delay = exponential_delay(attempt, config);
    let jitter = config.jitter_factor();
    if jitter <= 0.0 {
        return delay;
    }
    let factor = 1.0 + rng.gen_range(-jitter..=jitter);
    let jittered = (delay.as_secs_f64() * factor).clamp(0.0, max.as_secs_f64());
    Duration::from_secs_f64(jittered)
}

/// Un-jittered delay: `base * 2^(attempt-1)`, capped at `max_delay`.
pub fn exponential_delay(attempt: u32, config: &RetryConfig) -> Duration {
    // 2^30 * any sane base already exceeds every realistic cap.
    let exp = 1u32 << attempt.saturating_sub(1).min(30);
    config.base_delay().saturating_mul(exp).min(config.max_delay())
}
