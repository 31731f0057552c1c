//! The REST contract consumed by the orchestration engine.

use crate::error::TransportResult;
use serde_json::Value;

/// Request/response contract against the managed system.
///
/// Implementations handle rate-limit retries internally (see
/// [`RestTransport`](crate::RestTransport)); every other non-2xx response
/// surfaces as a fatal [`TransportError`](crate::TransportError). Paths are
/// relative to the API root; ids are appended as a path segment.
pub trait RestClient: Send + Sync {
    /// Idempotent read. An empty 2xx body decodes as JSON null.
    fn get(&self, path: &str, params: &[(&str, &str)]) -> TransportResult<Value>;

    /// Creates a resource. May return no body.
    fn post(&self, path: &str, body: &Value) -> TransportResult<Option<Value>>;

    /// Updates the resource identified by `id`. May return no body.
    fn put(&self, path: &str, id: &str, body: &Value) -> TransportResult<Option<Value>>;

    /// Deletes the resource identified by `id`. May return no body.
    fn delete(&self, path: &str, id: &str) -> TransportResult<Option<Value>>;
}
