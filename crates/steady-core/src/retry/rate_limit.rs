//! Last observed throttle signal for one client.
//!
//! The governor records every 429 here and consults it before the first
//! attempt of new calls, so a client that was just told to back off does not
//! fire requests that are certain to be throttled again. The hint is a pacing
//! heuristic only: it may be stale or belong to another endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

/// A throttle signal as observed by the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    /// Server-supplied wait, if the 429 carried `Retry-After`.
    pub retry_after: Option<Duration>,
    pub observed_at: Instant,
}

impl RateLimitState {
    /// Time left of the hinted wait at `now` (None once it has passed or when no hint was given).
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let wait = self.retry_after?;
        let elapsed = now.saturating_duration_since(self.observed_at);
        let left = wait.saturating_sub(elapsed);
        (!left.is_zero()).then_some(left)
    }
}

/// Shared, per-client throttle record.
///
/// Written only by the governor after a rate-limited response; read by every
/// call before its first attempt. One instance per client, shared via `Arc`.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    state: RwLock<Option<RateLimitState>>,
    throttled_events: AtomicU64,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rate-limited response observed now.
    pub fn record_throttled(&self, retry_after: Option<Duration>) {
        let observed_at = Instant::now();
        self.throttled_events.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(RateLimitState {
            retry_after,
            observed_at,
        });
    }

    /// Most recent throttle signal, if any.
    pub fn snapshot(&self) -> Option<RateLimitState> {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait still owed to the server according to the latest hint.
    pub fn pending_delay(&self) -> Option<Duration> {
        self.snapshot()?.remaining_at(Instant::now())
    }

    /// Number of rate-limited responses recorded since creation.
    pub fn throttled_events(&self) -> u64 {
        self.throttled_events.load(Ordering::Relaxed)
    }

    /// Forget the current hint (event counter is kept).
    pub fn clear(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
