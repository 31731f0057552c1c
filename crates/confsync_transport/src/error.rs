//! Error types for the transport layer.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while talking to the managed system.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The backend rate-limited the request.
    ///
    /// Handled inside the retry wrapper; callers only see it if they use a
    /// backend directly, without the wrapper.
    #[error("rate limited on {path} (status {status})")]
    RateLimited {
        /// Request path.
        path: String,
        /// HTTP status (429 or 503).
        status: u16,
    },

    /// The backend rejected the request with a non-retryable status.
    #[error("request to {path} failed with status {status}: {message}")]
    Fatal {
        /// Request path.
        path: String,
        /// HTTP status.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// The backend could not be reached at all.
    #[error("network error on {path}: {message}")]
    Network {
        /// Request path.
        path: String,
        /// Underlying error description.
        message: String,
    },

    /// The retry budget for rate-limited responses was exhausted.
    #[error("maximum retries exceeded for {path}")]
    MaxRetriesExceeded {
        /// Request path.
        path: String,
    },

    /// A 2xx response carried a body that was not valid JSON.
    #[error("invalid response body from {path}: {message}")]
    InvalidBody {
        /// Request path.
        path: String,
        /// Parse error description.
        message: String,
    },
}

impl TransportError {
    /// Returns true for rate-limit responses (the only retryable class).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::RateLimited { .. })
    }
}

/// Returns true if an HTTP status signals rate limiting.
pub fn status_is_rate_limit(status: u16) -> bool {
    status == 429 || status == 503
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_statuses() {
        assert!(status_is_rate_limit(429));
        assert!(status_is_rate_limit(503));
        assert!(!status_is_rate_limit(500));
        assert!(!status_is_rate_limit(200));
    }

    #[test]
    fn classification() {
        let err = TransportError::RateLimited {
            path: "template/device".into(),
            status: 429,
        };
        assert!(err.is_rate_limited());

        let err = TransportError::Fatal {
            path: "template/device".into(),
            status: 404,
            message: "not found".into(),
        };
        assert!(!err.is_rate_limited());
    }
}
