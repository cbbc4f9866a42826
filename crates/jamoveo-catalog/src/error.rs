//! Catalog error types.

/// Catalog failures.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// SQLite error.
    #[error("database error: {0}")]
    Database(String),

    /// Stored or imported JSON could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// File access failed.
    #[error("IO error: {0}")]
    Io(String),

    /// An imported document is missing a required field.
    #[error("invalid song document: {0}")]
    InvalidDocument(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Serialization(e.to_string())
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
