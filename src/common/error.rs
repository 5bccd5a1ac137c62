use thiserror::Error;

use super::types::PageId;

/// Storage engine error taxonomy.
///
/// Lower layers return kinds and never log; the engine decides user-facing
/// messaging.
#[derive(Error, Debug)]
pub enum MiniError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid page {0}")]
    InvalidPage(PageId),

    #[error("Unpin of page {0} with zero pin count")]
    DoubleUnpin(PageId),

    #[error("Buffer pool is full, every frame is pinned")]
    OutOfFrames,

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Duplicate key")]
    DuplicateKey,

    #[error("Not found")]
    NotFound,

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Corruption: {0}")]
    Corruption(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Index {0} already exists")]
    IndexExists(String),

    #[error("Index {0} not found")]
    IndexNotFound(String),

    #[error("Engine is in read-only degraded state")]
    ReadOnly,
}

pub type Result<T> = std::result::Result<T, MiniError>;
