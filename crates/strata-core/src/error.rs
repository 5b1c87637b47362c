use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Strata operations
#[derive(Error, Debug, Diagnostic)]
pub enum StrataError {
    /// Queue path is empty or names the reserved root
    #[error("Invalid queue path: {path:?}")]
    #[diagnostic(
        code(strata::invalid_queue_path),
        help("Queue paths are dot-separated and rooted at 'root', e.g. 'root.team-a.batch'. The root queue itself cannot be created or replaced")
    )]
    InvalidQueuePath { path: String },

    /// A resource quantity string could not be parsed
    #[error("Invalid quantity {value:?}: {reason}")]
    #[diagnostic(
        code(strata::invalid_quantity),
        help("Use Kubernetes quantity notation: '500m', '2', '128Mi', '1Gi'")
    )]
    InvalidQuantity { value: String, reason: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(strata::serialization_error),
        help("Ensure the object is valid JSON in the expected wire format")
    )]
    SerializationError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for Strata core operations
pub type Result<T> = std::result::Result<T, StrataError>;

impl StrataError {
    /// Create an InvalidQueuePath error
    pub fn invalid_queue_path(path: impl Into<String>) -> Self {
        Self::InvalidQueuePath { path: path.into() }
    }

    /// Create an InvalidQuantity error
    pub fn invalid_quantity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }
}
