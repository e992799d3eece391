//! Engine-level error type and result alias.

use loam_store::StoreError;
use loam_types::RecordId;

/// Everything that can go wrong above the storage boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A caller handed the engine something it cannot accept (a scalar where
    /// identity is required, a negative blob bound, malformed input).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored record names a custom class that is not registered in this
    /// scope's registry.
    #[error("no registered class for type tag {tag:?}")]
    UnknownTypeTag { tag: String },

    /// The value has no flat representation (a non-finite number in JSON
    /// export, a cyclic graph where a tree is required).
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// Method dispatch on a custom class found no such method.
    #[error("no method {method:?} on {tag:?}")]
    MethodNotFound { tag: String, method: String },

    /// A reference pointed at a record the store no longer holds.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// A mutation was attempted through a scope whose database has been
    /// switched to read-only.
    #[error("database is read-only")]
    ReadOnly,

    /// The storage backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
