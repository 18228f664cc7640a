//! Error types for Schoolgate

use thiserror::Error;

/// Failures raised by the store and the lookups built on it.
///
/// Authorization denials and protection-rule blocks are not errors here;
/// see [`crate::gate::Decision`] and [`crate::protected::Violation`].
#[derive(Debug, Error)]
pub enum GateError {
    #[error("storage error: {0}")]
    Storage(#[from] heed::Error),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("already bootstrapped")]
    AlreadyBootstrapped,

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl GateError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        GateError::NotFound { kind, id: id.to_string() }
    }
}

impl From<std::io::Error> for GateError {
    fn from(e: std::io::Error) -> Self {
        GateError::Storage(heed::Error::Io(e))
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, GateError>;
