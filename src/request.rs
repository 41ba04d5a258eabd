//! The data shared between [`Connection`](crate::connection::Connection) and
//! [`Pool`](crate::Pool).

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::HeaderMap;

/// A single APNs push request: always `POST /3/device/<token>`.
///
/// Immutable after construction. `deadline` is computed from `timeout` at
/// construction and is the sole time budget the pool honors.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) deadline: Instant,
}

/// Requests are retried solely against the deadline; this is the default
/// `timeout` used by [`Request::new`] when the caller doesn't specify one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

impl Request {
    /// Builds a request with the default 10-second timeout.
    pub fn new(path: impl Into<String>, headers: HeaderMap, body: impl Into<Bytes>) -> Request {
        Request::with_timeout(path, headers, body, DEFAULT_TIMEOUT)
    }

    /// Builds a request whose deadline is `Instant::now() + timeout`.
    pub fn with_timeout(
        path: impl Into<String>,
        headers: HeaderMap,
        body: impl Into<Bytes>,
        timeout: Duration,
    ) -> Request {
        Request {
            path: path.into(),
            headers,
            body: body.into(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn has_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_deadline_is_detected_immediately() {
        let req = Request::with_timeout(
            "/3/device/abc",
            HeaderMap::new(),
            Bytes::new(),
            Duration::from_secs(0),
        );
        std::thread::sleep(Duration::from_millis(1));
        assert!(req.has_expired());
    }

    #[test]
    fn fresh_request_has_not_expired() {
        let req = Request::new("/3/device/abc", HeaderMap::new(), Bytes::new());
        assert!(!req.has_expired());
    }
}
