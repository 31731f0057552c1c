//! ureq-backed HTTP transport.

use confsync_transport::{HttpBackend, HttpRequest, HttpResponse, Method};
use std::io::Read;
use std::time::Duration;

/// [`HttpBackend`] implementation over a blocking `ureq` agent.
///
/// The only place a concrete HTTP library appears; everything above talks
/// through the transport abstraction.
pub struct UreqBackend {
    agent: ureq::Agent,
    token: Option<String>,
}

impl UreqBackend {
    /// Creates a backend with a 30 second request timeout.
    pub fn new(token: Option<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            token,
        }
    }
}

impl HttpBackend for UreqBackend {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut req = match request.method {
            Method::Get => self.agent.get(&request.url),
            Method::Post => self.agent.post(&request.url),
            Method::Put => self.agent.put(&request.url),
            Method::Delete => self.agent.delete(&request.url),
        };

        req = req.set("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }

        let result = match &request.body {
            Some(body) => req
                .set("Content-Type", "application/json")
                .send_bytes(body),
            None => req.call(),
        };

        let response = match result {
            Ok(response) => response,
            // Non-2xx responses reach the retry wrapper as responses, not
            // as transport failures.
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => return Err(transport.to_string()),
        };

        let status = response.status();
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| e.to_string())?;

        Ok(HttpResponse { status, body })
    }
}
