//! Model error type.

use thiserror::Error;

/// Result type used across the model layer.
pub type ModelResult<T> = Result<T, ModelError>;

/// Model-level error.
///
/// Only deterministic failures belong here (parsing, validation).
/// Storage and transport failures are modelled by the infrastructure crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A qualified name did not have the `{namespace}local` shape.
    #[error("invalid qualified name: {0}")]
    InvalidQName(String),

    /// A value failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An optimistic version check failed.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ModelError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_qname(msg: impl Into<String>) -> Self {
        Self::InvalidQName(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
