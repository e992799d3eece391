use loam_types::{RecordId, TxnId};

/// Errors from backing-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The transaction id is unknown (already committed, aborted, or never
    /// begun).
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxnId),

    /// A record that must exist for the operation does not.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// The requested blob does not exist.
    #[error("blob not found: {0}")]
    BlobNotFound(RecordId),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
