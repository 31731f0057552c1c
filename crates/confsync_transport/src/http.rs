//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via [`HttpBackend`] so different
//! libraries (ureq, reqwest, a loopback for tests) can sit underneath
//! without the engine noticing.

use crate::client::RestClient;
use crate::error::{status_is_rate_limit, TransportError, TransportResult};
use crate::retry::RetryPolicy;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// PUT request.
    Put,
    /// DELETE request.
    Delete,
}

/// One outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Full request URL including query parameters.
    pub url: String,
    /// JSON-encoded body, if any.
    pub body: Option<Vec<u8>>,
}

/// One inbound HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. A network
/// failure (could not reach the backend at all) is reported as `Err`; any
/// response the backend produced, whatever the status, is `Ok`.
pub trait HttpBackend: Send + Sync {
    /// Sends a request and returns the raw response.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// REST transport over an [`HttpBackend`], with retry/backoff.
///
/// Every call is wrapped in the retry policy: rate-limit responses (429 and
/// 503) sleep and retry up to the policy's attempt bound, all other non-2xx
/// responses fail immediately.
pub struct RestTransport<B: HttpBackend> {
    base_url: String,
    backend: B,
    policy: RetryPolicy,
    rate_limit_retries: AtomicU64,
}

impl<B: HttpBackend> RestTransport<B> {
    /// Creates a new transport.
    pub fn new(base_url: impl Into<String>, backend: B, policy: RetryPolicy) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            backend,
            policy,
            rate_limit_retries: AtomicU64::new(0),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Total rate-limit retries performed over the transport's lifetime.
    pub fn rate_limit_retries(&self) -> u64 {
        self.rate_limit_retries.load(Ordering::SeqCst)
    }

    fn url_for(&self, path: &str, id: Option<&str>, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}/{}", self.base_url, path.trim_matches('/'));
        if let Some(id) = id {
            url.push('/');
            url.push_str(id);
        }
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }

    fn execute(
        &self,
        method: Method,
        path: &str,
        id: Option<&str>,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> TransportResult<Option<Value>> {
        let url = self.url_for(path, id, params);
        let request = HttpRequest {
            method,
            url,
            body: body.map(|b| b.to_string().into_bytes()),
        };

        let mut retry = 0u32;
        loop {
            let response =
                self.backend
                    .send(&request)
                    .map_err(|message| TransportError::Network {
                        path: path.to_string(),
                        message,
                    })?;

            if status_is_rate_limit(response.status) {
                if retry + 1 >= self.policy.max_retries {
                    warn!(path, retries = retry, "rate-limit retry budget exhausted");
                    return Err(TransportError::MaxRetriesExceeded {
                        path: path.to_string(),
                    });
                }
                let delay = self.policy.delay_for_attempt(retry);
                debug!(path, status = response.status, ?delay, "rate limited, backing off");
                std::thread::sleep(delay);
                retry += 1;
                self.rate_limit_retries.fetch_add(1, Ordering::SeqCst);
                continue;
            }

            if !(200..300).contains(&response.status) {
                return Err(TransportError::Fatal {
                    path: path.to_string(),
                    status: response.status,
                    message: body_excerpt(&response.body),
                });
            }

            if response.body.is_empty() {
                return Ok(None);
            }

            return serde_json::from_slice(&response.body)
                .map(Some)
                .map_err(|e| TransportError::InvalidBody {
                    path: path.to_string(),
                    message: e.to_string(),
                });
        }
    }
}

impl<B: HttpBackend> RestClient for RestTransport<B> {
    fn get(&self, path: &str, params: &[(&str, &str)]) -> TransportResult<Value> {
        Ok(self
            .execute(Method::Get, path, None, params, None)?
            .unwrap_or(Value::Null))
    }

    fn post(&self, path: &str, body: &Value) -> TransportResult<Option<Value>> {
        self.execute(Method::Post, path, None, &[], Some(body))
    }

    fn put(&self, path: &str, id: &str, body: &Value) -> TransportResult<Option<Value>> {
        self.execute(Method::Put, path, Some(id), &[], Some(body))
    }

    fn delete(&self, path: &str, id: &str) -> TransportResult<Option<Value>> {
        self.execute(Method::Delete, path, Some(id), &[], None)
    }
}

fn body_excerpt(body: &[u8]) -> String {
    const LIMIT: usize = 200;
    let text = String::from_utf8_lossy(body);
    if text.len() > LIMIT {
        format!("{}...", &text[..LIMIT])
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use serde_json::json;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_time_unit(Duration::from_micros(10))
            .without_jitter()
    }

    #[test]
    fn get_decodes_json() {
        let backend = MockBackend::new();
        backend.push_json(200, json!({"data": [1, 2, 3]}));

        let transport = RestTransport::new("https://vm1/dataservice", backend, fast_policy());
        let value = transport.get("template/device", &[]).unwrap();

        assert_eq!(value["data"], json!([1, 2, 3]));
    }

    #[test]
    fn url_construction() {
        let backend = MockBackend::new();
        backend.push_json(200, json!(null));
        backend.push_body(200, Vec::new());

        let transport = RestTransport::new("https://vm1/dataservice/", backend, fast_policy());
        transport
            .get("template/device", &[("feature", "all")])
            .unwrap();
        transport.delete("template/policy/list/site", "id-1").unwrap();

        let requests = transport.backend.requests();
        assert_eq!(
            requests[0].url,
            "https://vm1/dataservice/template/device?feature=all"
        );
        assert_eq!(
            requests[1].url,
            "https://vm1/dataservice/template/policy/list/site/id-1"
        );
    }

    #[test]
    fn empty_body_is_none() {
        let backend = MockBackend::new();
        backend.push_body(200, Vec::new());

        let transport = RestTransport::new("https://vm1", backend, fast_policy());
        let response = transport.post("template/feature", &json!({})).unwrap();

        assert!(response.is_none());
    }

    #[test]
    fn rate_limit_then_success() {
        let backend = MockBackend::new();
        backend.push_body(429, Vec::new());
        backend.push_body(503, Vec::new());
        backend.push_json(200, json!({"ok": true}));

        let transport = RestTransport::new("https://vm1", backend, fast_policy());
        let value = transport.get("template/device", &[]).unwrap();

        assert_eq!(value["ok"], json!(true));
        // Exactly two backoff sleeps occurred.
        assert_eq!(transport.rate_limit_retries(), 2);
    }

    #[test]
    fn other_status_fails_without_retry() {
        let backend = MockBackend::new();
        backend.push_body(404, b"no such template".to_vec());

        let transport = RestTransport::new("https://vm1", backend, fast_policy());
        let err = transport.get("template/device", &[]).unwrap_err();

        assert!(matches!(
            err,
            TransportError::Fatal { status: 404, .. }
        ));
        assert_eq!(transport.backend.requests().len(), 1);
        assert_eq!(transport.rate_limit_retries(), 0);
    }

    #[test]
    fn retry_budget_exhaustion() {
        let backend = MockBackend::new();
        for _ in 0..20 {
            backend.push_body(429, Vec::new());
        }

        let policy = fast_policy().with_max_retries(3);
        let transport = RestTransport::new("https://vm1", backend, policy);
        let err = transport.get("template/device", &[]).unwrap_err();

        assert!(matches!(err, TransportError::MaxRetriesExceeded { .. }));
        // max_retries bounds total attempts.
        assert_eq!(transport.backend.requests().len(), 3);
    }

    #[test]
    fn network_failure_is_fatal() {
        let backend = MockBackend::new();
        backend.push_network_error("connection refused");

        let transport = RestTransport::new("https://vm1", backend, fast_policy());
        let err = transport.get("device/action/status/a1", &[]).unwrap_err();

        assert!(matches!(err, TransportError::Network { .. }));
    }
}
