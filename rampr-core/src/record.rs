use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rampr_http::HttpTransportErrorKind;

/// Status reported when no HTTP response was received.
pub const FAILED_STATUS: u16 = 0;

/// Outcome of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub status: u16,
    pub latency: Duration,
    pub timestamp: SystemTime,
    /// Set when the request never produced a response (connect error, timeout, ...).
    pub error: Option<HttpTransportErrorKind>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl RequestRecord {
    pub fn completed(status: u16, latency: Duration) -> Self {
        Self {
            status,
            latency,
            timestamp: SystemTime::now(),
            error: None,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    pub fn transport_failure(kind: HttpTransportErrorKind, latency: Duration) -> Self {
        Self {
            status: FAILED_STATUS,
            latency,
            timestamp: SystemTime::now(),
            error: Some(kind),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    #[must_use]
    pub fn with_bytes(mut self, sent: u64, received: u64) -> Self {
        self.bytes_sent = sent;
        self.bytes_received = received;
        self
    }

    /// Transport errors and statuses outside `200..=399` count as failed.
    pub fn is_failed(&self) -> bool {
        self.error.is_some() || !(200..400).contains(&self.status)
    }

    /// Key used for the error breakdown; `None` for successful requests.
    pub fn error_key(&self) -> Option<String> {
        match self.error {
            Some(kind) => Some(kind.to_string()),
            None if self.is_failed() => Some(format!("status_{}", self.status)),
            None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: Arc<str>,
    pub passed: bool,
}

/// Everything one behavior invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationOutcome {
    pub requests: Vec<RequestRecord>,
    pub checks: Vec<CheckResult>,
}

impl IterationOutcome {
    pub fn single(record: RequestRecord) -> Self {
        Self {
            requests: vec![record],
            checks: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classification() {
        let ms = Duration::from_millis(1);
        assert!(!RequestRecord::completed(200, ms).is_failed());
        assert!(!RequestRecord::completed(304, ms).is_failed());
        assert!(RequestRecord::completed(404, ms).is_failed());
        assert!(RequestRecord::completed(503, ms).is_failed());
        assert!(RequestRecord::completed(101, ms).is_failed());

        let timeout = RequestRecord::transport_failure(HttpTransportErrorKind::Timeout, ms);
        assert!(timeout.is_failed());
        assert_eq!(timeout.error_key().as_deref(), Some("timeout"));
        assert_eq!(timeout.status, FAILED_STATUS);
    }

    #[test]
    fn error_keys() {
        let ms = Duration::from_millis(1);
        assert_eq!(RequestRecord::completed(200, ms).error_key(), None);
        assert_eq!(
            RequestRecord::completed(503, ms).error_key().as_deref(),
            Some("status_503")
        );
        assert_eq!(
            RequestRecord::transport_failure(HttpTransportErrorKind::Request, ms)
                .error_key()
                .as_deref(),
            Some("request")
        );
    }
}
