//! A scripted mock backend for tests.

use crate::http::{HttpBackend, HttpRequest, HttpResponse};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

enum Scripted {
    Response(HttpResponse),
    NetworkError(String),
}

/// A mock [`HttpBackend`] that replays scripted responses in order and
/// records every request it receives.
///
/// When the script runs dry the mock answers 200 with an empty body, so
/// tests only script the interesting part of an exchange.
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockBackend {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a response with a raw body.
    pub fn push_body(&self, status: u16, body: Vec<u8>) {
        self.script
            .lock()
            .push_back(Scripted::Response(HttpResponse { status, body }));
    }

    /// Scripts a JSON response.
    pub fn push_json(&self, status: u16, body: Value) {
        self.push_body(status, body.to_string().into_bytes());
    }

    /// Scripts a network failure.
    pub fn push_network_error(&self, message: impl Into<String>) {
        self.script
            .lock()
            .push_back(Scripted::NetworkError(message.into()));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

impl HttpBackend for MockBackend {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        self.requests.lock().push(request.clone());

        match self.script.lock().pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::NetworkError(message)) => Err(message),
            None => Ok(HttpResponse {
                status: 200,
                body: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    #[test]
    fn scripted_responses_replay_in_order() {
        let mock = MockBackend::new();
        mock.push_body(429, Vec::new());
        mock.push_json(200, serde_json::json!({"ok": true}));

        let request = HttpRequest {
            method: Method::Get,
            url: "https://vm1/x".into(),
            body: None,
        };

        assert_eq!(mock.send(&request).unwrap().status, 429);
        assert_eq!(mock.send(&request).unwrap().status, 200);
        // Script exhausted: default empty 200.
        let last = mock.send(&request).unwrap();
        assert_eq!(last.status, 200);
        assert!(last.body.is_empty());

        assert_eq!(mock.requests().len(), 3);
    }
}
