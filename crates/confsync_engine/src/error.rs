//! Error types for the orchestration engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during an orchestration run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The transport rejected a request.
    #[error("transport error: {0}")]
    Transport(#[from] confsync_transport::TransportError),

    /// A catalog lookup failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] confsync_catalog::CatalogError),

    /// A data-model operation failed.
    #[error("data error: {0}")]
    Model(#[from] confsync_core::CoreError),

    /// A category name has no descriptor in the catalog.
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    /// The backend answered a write with a shape the adapter cannot use.
    #[error("unexpected response from {path}: {message}")]
    UnexpectedResponse {
        /// Request path.
        path: String,
        /// What was wrong with the response.
        message: String,
    },

    /// A wait group finished with failed or timed-out actions.
    ///
    /// Raised only when the caller asked for failures to be escalated;
    /// otherwise the condition is logged and reported through the run
    /// tally.
    #[error("wait for '{context}' failed")]
    ActionWaitFailed {
        /// Description of the high-level step that was waiting.
        context: String,
    },
}

impl EngineError {
    pub(crate) fn unexpected_response(
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UnexpectedResponse {
            path: path.into(),
            message: message.into(),
        }
    }
}
