//! Store errors.

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Fast-tier failure. Always recoverable by falling through to durable.
#[derive(Debug, Clone, thiserror::Error)]
#[error("fast cache error: {0}")]
pub struct CacheError(pub String);

/// Errors raised by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Durable tier failed.
    #[error("durable store error: {0}")]
    Durable(String),

    /// SQLite-level failure in the durable implementation.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool exhausted or broken.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Context could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Object store refused or lost a blob.
    #[error("object store error: {0}")]
    Object(String),

    /// A key that must be written at most once already exists.
    #[error("object key collision: {0}")]
    KeyCollision(String),
}
