//! Error types for tfplug

/// Error type for value access in tfplug
#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("Invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
}

/// Result type alias for tfplug operations
pub type Result<T> = std::result::Result<T, TfplugError>;
