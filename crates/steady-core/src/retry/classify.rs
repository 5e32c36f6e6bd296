//! Classify HTTP status and transport errors into retry policy error kinds.

use std::time::Duration;

use crate::retry::policy::ErrorKind;
use crate::transport::{HttpResponse, TransportError};

/// Classify a non-2xx HTTP status.
///
/// 2xx responses are successes and are split off before classification;
/// passed here they land in `Unknown` like any other unexpected status.
pub fn classify_http_status(status: u16) -> ErrorKind {
    match status {
        429 => ErrorKind::RateLimited,
        500 | 502 | 503 | 504 => ErrorKind::ServerError,
        400 | 401 | 403 | 404 | 409 => ErrorKind::ClientError,
        _ => ErrorKind::Unknown,
    }
}

/// Classify a failure to obtain any response.
pub fn classify_transport_error(e: &TransportError) -> ErrorKind {
    if e.is_timeout() {
        return ErrorKind::Timeout;
    }
    ErrorKind::Network
}

/// Classify the raw result of one attempt that did not succeed.
pub fn classify(result: &Result<HttpResponse, TransportError>) -> ErrorKind {
    match result {
        Ok(resp) => classify_http_status(resp.status),
        Err(e) => classify_transport_error(e),
    }
}

/// Parse `Retry-After` as whole non-negative seconds.
///
/// Absent, negative, fractional or HTTP-date values yield `None`.
pub fn parse_retry_after(resp: &HttpResponse) -> Option<Duration> {
    let raw = resp.header("retry-after")?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_rate_limited() {
        assert_eq!(classify_http_status(429), ErrorKind::RateLimited);
    }

    #[test]
    fn http_5xx_server_error() {
        for code in [500, 502, 503, 504] {
            assert_eq!(classify_http_status(code), ErrorKind::ServerError);
        }
    }

    #[test]
    fn http_4xx_client_error() {
        for code in [400, 401, 403, 404, 409] {
            assert_eq!(classify_http_status(code), ErrorKind::ClientError);
        }
    }

    #[test]
    fn unexpected_statuses_unknown() {
        for code in [0, 100, 200, 302, 405, 413, 422, 501, 505, 599, 999] {
            assert_eq!(classify_http_status(code), ErrorKind::Unknown, "status {}", code);
        }
    }

    #[test]
    fn classification_is_total_over_status_space() {
        for code in 0..=u16::MAX {
            let kind = classify_http_status(code);
            if !kind.is_retryable() {
                assert!(matches!(kind, ErrorKind::ClientError | ErrorKind::Unknown));
            }
        }
    }

    #[test]
    fn transport_errors() {
        let timeout = TransportError::TimedOut(Duration::from_secs(1));
        assert_eq!(classify_transport_error(&timeout), ErrorKind::Timeout);
        let reset = TransportError::Connection("reset by peer".into());
        assert_eq!(classify_transport_error(&reset), ErrorKind::Network);
        let worker = TransportError::Worker("panicked".into());
        assert_eq!(classify_transport_error(&worker), ErrorKind::Network);
        assert_eq!(classify(&Err(reset)), ErrorKind::Network);
        assert_eq!(classify(&Ok(HttpResponse::new(503))), ErrorKind::ServerError);
    }

    #[test]
    fn retry_after_parsing() {
        let r = HttpResponse::new(429).with_header("Retry-After", "5");
        assert_eq!(parse_retry_after(&r), Some(Duration::from_secs(5)));
        let r = HttpResponse::new(429).with_header("retry-after", "0");
        assert_eq!(parse_retry_after(&r), Some(Duration::ZERO));
        let r = HttpResponse::new(429).with_header("Retry-After", "-3");
        assert_eq!(parse_retry_after(&r), None);
        let r = HttpResponse::new(429).with_header("Retry-After", "1.5");
        assert_eq!(parse_retry_after(&r), None);
        let r = HttpResponse::new(429).with_header("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(&r), None);
        assert_eq!(parse_retry_after(&HttpResponse::new(429)), None);
    }
}
