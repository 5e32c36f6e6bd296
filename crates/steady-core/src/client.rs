//! Client facade: one transport, one throttle record, one retry policy.

use std::sync::Arc;
use std::time::Duration;

use crate::config::SteadyConfig;
use crate::error::CallFailure;
use crate::retry::{RateLimitTracker, RetryConfig, RetryGovernor};
use crate::transport::{CurlTransport, HttpRequest, HttpResponse, Transport};
use crate::upload::{UploadOrchestrator, UploadProtocol};

/// Entry point for resilient calls against one API.
///
/// Cheap to clone; clones share the transport and the rate-limit tracker, so
/// a 429 seen by one call paces the next call made through any clone.
pub struct SteadyClient<T> {
    transport: Arc<T>,
    tracker: Arc<RateLimitTracker>,
    retry: RetryConfig,
    request_timeout: Option<Duration>,
}

impl<T> Clone for SteadyClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            tracker: Arc::clone(&self.tracker),
            retry: self.retry,
            request_timeout: self.request_timeout,
        }
    }
}

impl SteadyClient<CurlTransport> {
    /// Client over libcurl configured from `config`.
    pub fn from_config(config: &SteadyConfig) -> anyhow::Result<Self> {
        Ok(Self::new(CurlTransport::default(), config.retry_config()?)
            .with_request_timeout(config.request_timeout()))
    }
}

impl<T: Transport> SteadyClient<T> {
    pub fn new(transport: T, retry: RetryConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            tracker: Arc::new(RateLimitTracker::new()),
            retry,
            request_timeout: None,
        }
    }

    /// Per-attempt deadline for calls made with [`send`](Self::send).
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn rate_limits(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    fn governor(&self) -> RetryGovernor {
        RetryGovernor::new(self.retry, Arc::clone(&self.tracker)).with_attempt_timeout(self.request_timeout)
    }

    /// Send `request` with retries; Ok only for a 2xx response.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CallFailure> {
        tracing::debug!(method = %request.method, url = %request.url, "api call");
        self.governor().send(&*self.transport, &request).await
    }

    /// Orchestrator for large payloads through `protocol`, sharing this
    /// client's transport, retry policy and throttle record.
    pub fn uploader<P: UploadProtocol>(&self, protocol: P) -> UploadOrchestrator<T, P> {
        UploadOrchestrator::new(Arc::clone(&self.transport), Arc::new(protocol), self.governor())
    }
}
