//! Client-side resilience for rate-limited HTTP APIs: classified retries with
//! backoff and throttle pacing, and multi-part uploads of large payloads.

pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod retry;
pub mod transport;
pub mod upload;

#[cfg(test)]
mod testing;

pub use client::SteadyClient;
pub use config::SteadyConfig;
pub use control::UploadControl;
pub use error::{CallFailure, SteadyError};
pub use retry::{ErrorKind, RateLimitTracker, RetryConfig, RetryGovernor};
pub use transport::{CurlTransport, HttpRequest, HttpResponse, Method, Transport, TransportError};
pub use upload::{
    FileUploadOptions, FileUploadProgress, FileUploadsApi, UploadLimits, UploadOrchestrator, UploadResult,
    UploadSource, UploadStatus,
};
