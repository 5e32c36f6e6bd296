//! libcurl-backed transport: one Easy handle per exchange on tokio's blocking pool.

use std::future::Future;
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{HttpRequest, HttpResponse, Method, Transport, TransportError};

/// Curl settings applied to every exchange.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Abort when throughput stays below this many bytes/sec for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Wall-clock limit for requests that carry none of their own (None = unlimited).
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Some(Duration::from_secs(300)),
            follow_redirects: true,
        }
    }
}

/// [`Transport`] built on the curl crate.
///
/// Each call creates a fresh `Easy` handle and runs the blocking transfer via
/// `spawn_blocking`, so async workers are never parked on network I/O. The
/// request deadline is a curl timeout, and dropping the returned future
/// aborts the transfer from its progress callback.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: CurlOptions,
}

impl CurlTransport {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CurlOptions {
        &self.options
    }
}

impl Transport for CurlTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let options = self.options;
        async move {
            let abort = Arc::new(AtomicBool::new(false));
            let _guard = AbortOnDrop(Arc::clone(&abort));
            tokio::task::spawn_blocking(move || perform(&request, options, &abort))
                .await
                .map_err(|e| TransportError::Worker(e.to_string()))?
        }
    }
}

/// Flags the transfer for abort when the awaiting future goes away.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Runs one exchange in the current thread.
fn perform(
    request: &HttpRequest,
    options: CurlOptions,
    abort: &AtomicBool,
) -> Result<HttpResponse, TransportError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url)?;
    easy.follow_location(options.follow_redirects)?;
    easy.connect_timeout(options.connect_timeout)?;
    easy.low_speed_limit(options.low_speed_limit)?;
    easy.low_speed_time(options.low_speed_time)?;
    if let Some(timeout) = request.timeout.or(options.timeout) {
        easy.timeout(timeout)?;
    }
    easy.progress(true)?;

    match request.method {
        Method::Get => easy.get(true)?,
        Method::Post => easy.post_fields_copy(&request.body)?,
        Method::Put | Method::Patch | Method::Delete => {
            easy.custom_request(request.method.as_str())?;
            if !request.body.is_empty() {
                easy.post_fields_copy(&request.body)?;
            }
        }
    }

    let mut list = curl::easy::List::new();
    for (k, v) in &request.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    // Large bodies would otherwise wait for a 100-continue some servers never send.
    list.append("Expect:")?;
    easy.http_headers(list)?;

    let mut header_lines: Vec<String> = Vec::new();
    let mut body: Vec<u8> = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                // A new status line starts a new header block (redirects, 100 Continue).
                if line.starts_with("HTTP/") {
                    header_lines.clear();
                } else if !line.is_empty() {
                    header_lines.push(line.to_string());
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        // Returning false aborts the transfer.
        transfer.progress_function(|_, _, _, _| !abort.load(Ordering::Relaxed))?;
        transfer.perform()?;
    }

    let status = easy.response_code()? as u16;
    Ok(HttpResponse {
        status,
        headers: parse_header_lines(&header_lines),
        body,
    })
}

fn parse_header_lines(lines: &[String]) -> Vec<(String, String)> {
    lines
        .iter()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}
