//! Error types for building, loading and querying a forest index

use thiserror::Error;

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, ForestError>;

/// Error types that can occur while building, persisting or querying an index
#[derive(Error, Debug)]
pub enum ForestError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate item identifier: {id}")]
    DuplicateIdentifier { id: String },

    #[error("Degenerate vector: {reason}")]
    DegenerateVector { reason: String },

    #[error("Cannot build an index from an empty vector set")]
    EmptyStore,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported index format version {found} (supported: {supported})")]
    UnsupportedFormatVersion { found: u32, supported: u32 },

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Unknown item identifier: {id}")]
    UnknownIdentifier { id: String },

    #[error("Invalid k: {k} (must be at least 1)")]
    InvalidK { k: usize },

    #[error("Catalog error on line {line}: {reason}")]
    Catalog { line: usize, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ForestError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        ForestError::CorruptIndex(reason.into())
    }

    /// The request referenced an item the index does not know about.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForestError::UnknownIdentifier { .. })
    }

    /// The request itself was malformed; retrying it cannot succeed.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            ForestError::InvalidK { .. }
                | ForestError::DimensionMismatch { .. }
                | ForestError::DegenerateVector { .. }
        )
    }
}
