//! Error types for the catalog
//!
//! Only the store boundary and the cover pipeline can fail. Sorting,
//! filtering and the status policy are total functions and have no error type.

use thiserror::Error;

/// Rejected user input. Raised before anything reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("author is required")]
    MissingAuthor,
}

/// Failure while turning a source image into a stored cover thumbnail.
///
/// Never fatal: the enclosing add/edit proceeds without a new cover.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read source image: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read image header: {0}")]
    Header(#[source] image::ImageError),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode thumbnail: {0}")]
    Encode(#[source] image::ImageError),
    #[error("source image has zero width or height")]
    EmptyImage,
    #[error("{width}x{height} image is too large to decode in this format")]
    TooLarge { width: u32, height: u32 },
    #[error("ingest task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failure in the persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Failure loading or parsing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

/// A name that doesn't match any variant of a stored enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Errors surfaced by mutation intents.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatalogError {
    /// Store failures are worth retrying; validation failures need new input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::Store(_))
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
