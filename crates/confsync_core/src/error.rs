//! Error types for the data model.

use thiserror::Error;

/// Result type for data model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while handling configuration items.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A payload did not have the expected structure.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A required field was missing from a payload.
    #[error("missing field '{field}' in {category} payload")]
    MissingField {
        /// Field name that was expected.
        field: String,
        /// Category of the offending item.
        category: String,
    },

    /// Payload serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A backend failed while serving a read.
    ///
    /// Wraps store and transport failures behind the `ConfigSource` seam so
    /// the engine can treat all sources uniformly.
    #[error("backend error: {0}")]
    Backend(String),
}

impl CoreError {
    /// Creates an invalid-payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    /// Creates a missing-field error.
    pub fn missing_field(field: impl Into<String>, category: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            category: category.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::missing_field("templateId", "template_device");
        assert!(err.to_string().contains("templateId"));
        assert!(err.to_string().contains("template_device"));
    }
}
