//! Engine error model.

use thiserror::Error;

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// Keep this focused on deterministic failures of the in-memory data model
/// (validation, invariants, protocol misuse). Numeric arithmetic has its own
/// value-level error taxonomy; persistence backends report through the
/// session boundary instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A structural invariant was violated (tree cycles, book mismatch).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested entity does not exist in this book.
    #[error("not found")]
    NotFound,

    /// The edit protocol was misused: mutating outside a begin/commit
    /// bracket, or editing a voided/read-only transaction. This indicates a
    /// programming error in the caller, not a data condition.
    #[error("edit protocol violation: {0}")]
    EditProtocol(String),

    /// A conflicting entity already exists.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::EditProtocol(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
