//! Retry loop: run one logical call until success, a fatal error, or the budget is spent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::outcome::AttemptOutcome;
use super::policy::{ErrorKind, RetryConfig, RetryDecision};
use super::rate_limit::RateLimitTracker;
use crate::error::CallFailure;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Drives attempts for a single logical call.
///
/// Cheap to clone: the config is copied and the tracker is shared, so every
/// clone paces against the same per-client throttle record.
#[derive(Debug, Clone)]
pub struct RetryGovernor {
    config: RetryConfig,
    tracker: Arc<RateLimitTracker>,
    attempt_timeout: Option<Duration>,
}

impl RetryGovernor {
    pub fn new(config: RetryConfig, tracker: Arc<RateLimitTracker>) -> Self {
        Self {
            config,
            tracker,
            attempt_timeout: None,
        }
    }

    /// Copy of this governor whose requests time out after `timeout` per attempt.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Send `request` through `transport` until a 2xx response or a terminal failure.
    ///
    /// Every attempt carries the request's own timeout, or else this governor's
    /// attempt timeout. The transport enforces it, so a timed-out attempt has
    /// stopped before the next one starts.
    pub async fn send<T: Transport>(
        &self,
        transport: &T,
        request: &HttpRequest,
    ) -> Result<HttpResponse, CallFailure> {
        self.send_counted(transport, request).await.map(|(resp, _)| resp)
    }

    /// [`send`](Self::send), also returning how many attempts the success took.
    pub async fn send_counted<T: Transport>(
        &self,
        transport: &T,
        request: &HttpRequest,
    ) -> Result<(HttpResponse, u32), CallFailure> {
        let request = request.clone().with_timeout(request.timeout.or(self.attempt_timeout));
        self.execute_counted(|| transport.send(request.clone())).await
    }

    /// Run `attempt_fn` until it yields a 2xx response or the call fails for good.
    ///
    /// `attempt_fn` must perform exactly one exchange per invocation and bound
    /// it itself. Attempts are strictly sequential and waits are async sleeps,
    /// so other calls keep running while this one backs off. On failure the
    /// *last* error is returned together with the number of attempts made.
    pub async fn execute<F, Fut>(&self, attempt_fn: F) -> Result<HttpResponse, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpResponse, TransportError>>,
    {
        self.execute_counted(attempt_fn).await.map(|(resp, _)| resp)
    }

    async fn execute_counted<F, Fut>(&self, mut attempt_fn: F) -> Result<(HttpResponse, u32), CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpResponse, TransportError>>,
    {
        self.pace_before_first_attempt().await;

        let mut attempt = 1u32;
        loop {
            let raw = attempt_fn().await;

            let (error, server_hint) = match AttemptOutcome::from_exchange(raw) {
                AttemptOutcome::Success(resp) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, status = resp.status, "call succeeded after retry");
                    }
                    return Ok((resp, attempt));
                }
                AttemptOutcome::Fatal(error) => {
                    tracing::warn!(attempt, error = %error, "call failed, not retryable");
                    return Err(CallFailure::new(error, attempt));
                }
                AttemptOutcome::Retryable { error, server_hint } => (error, server_hint),
            };

            let kind = error.kind().unwrap_or(ErrorKind::Unknown);
            if kind == ErrorKind::RateLimited {
                self.tracker.record_throttled(server_hint);
            }

            match self.config.decide(attempt, kind, server_hint) {
                RetryDecision::NoRetry => {
                    tracing::warn!(attempt, error = %error, "call failed, retries exhausted");
                    return Err(CallFailure::new(error, attempt));
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(
                        attempt,
                        ?kind,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Best-effort wait for a throttle hint left by an earlier call.
    async fn pace_before_first_attempt(&self) {
        let Some(wait) = self.tracker.pending_delay() else {
            return;
        };
        let wait = wait.min(self.config.max_delay());
        tracing::debug!(wait_ms = wait.as_millis() as u64, "pacing before first attempt");
        tokio::time::sleep(wait).await;
    }
}

/// Convenience wrapper for a one-off call with its own tracker.
pub async fn run_with_retry<F, Fut>(config: RetryConfig, attempt_fn: F) -> Result<HttpResponse, CallFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpResponse, TransportError>>,
{
    RetryGovernor::new(config, Arc::new(RateLimitTracker::new()))
        .execute(attempt_fn)
        .await
}
