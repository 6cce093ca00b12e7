use std::time::Duration;

use bytes::Bytes;
use rampr_http::{DEFAULT_CONNECT_TIMEOUT, HttpClient, HttpRequest};
use tokio::time::Instant;

use crate::record::RequestRecord;

/// The request every iteration sends. The payload is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// A record plus the response body, which checks may inspect.
#[derive(Debug, Clone)]
pub struct Executed {
    pub record: RequestRecord,
    pub body: Bytes,
}

/// Runs one request and turns every outcome, failures included, into a record.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: HttpClient,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(timeout: Duration) -> Self {
        let connect_timeout = DEFAULT_CONNECT_TIMEOUT.min(timeout);
        Self {
            client: HttpClient::new(Some(connect_timeout)),
            timeout,
        }
    }

    pub async fn execute(&self, spec: &RequestSpec) -> Executed {
        let req = HttpRequest {
            method: spec.method.clone(),
            url: spec.url.clone(),
            headers: spec.headers.clone(),
            body: spec.body.clone(),
            timeout: Some(self.timeout),
        };

        let started = Instant::now();
        let res = self.client.request(req).await;
        let latency = started.elapsed();

        match res {
            Ok(res) => Executed {
                record: RequestRecord::completed(res.status, latency)
                    .with_bytes(res.bytes_sent, res.bytes_received),
                body: res.body,
            },
            Err(err) => {
                tracing::trace!(url = %spec.url, error = %err, "request failed");
                Executed {
                    record: RequestRecord::transport_failure(err.transport_error_kind(), latency),
                    body: Bytes::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampr_http::HttpTransportErrorKind;
    use rampr_testserver::TestServer;

    fn get(url: String) -> RequestSpec {
        RequestSpec {
            method: http::Method::GET,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn successful_request_records_status_and_bytes() {
        let server = TestServer::start()
            .await
            .unwrap_or_else(|e| panic!("start server: {e}"));
        let exec = RequestExecutor::new(Duration::from_secs(5));

        let out = exec.execute(&get(format!("{}/hello", server.base_url()))).await;
        assert_eq!(out.record.status, 200);
        assert!(!out.record.is_failed());
        assert!(out.record.bytes_sent > 0);
        assert!(out.record.bytes_received > out.body.len() as u64);
        assert_eq!(&out.body[..], b"Hello World!");
    }

    #[tokio::test]
    async fn server_error_is_a_failed_record_not_an_error() {
        let server = TestServer::start()
            .await
            .unwrap_or_else(|e| panic!("start server: {e}"));
        let exec = RequestExecutor::new(Duration::from_secs(5));

        let out = exec.execute(&get(format!("{}/status/503", server.base_url()))).await;
        assert_eq!(out.record.status, 503);
        assert!(out.record.is_failed());
        assert_eq!(out.record.error, None);
    }

    #[tokio::test]
    async fn slow_response_times_out_with_sentinel_status() {
        let server = TestServer::start()
            .await
            .unwrap_or_else(|e| panic!("start server: {e}"));
        let exec = RequestExecutor::new(Duration::from_millis(100));

        let out = exec.execute(&get(format!("{}/slow?ms=2000", server.base_url()))).await;
        assert_eq!(out.record.status, crate::record::FAILED_STATUS);
        assert_eq!(out.record.error, Some(HttpTransportErrorKind::Timeout));
        assert!(out.record.latency < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn refused_connection_is_recorded() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap_or_else(|e| panic!("{e}"));
            l.local_addr().unwrap_or_else(|e| panic!("{e}"))
        };
        let exec = RequestExecutor::new(Duration::from_secs(2));

        let out = exec.execute(&get(format!("http://{addr}/"))).await;
        assert_eq!(out.record.status, crate::record::FAILED_STATUS);
        assert_eq!(out.record.error, Some(HttpTransportErrorKind::Request));
    }
}
