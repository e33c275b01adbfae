//! Error types for the Memline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Memline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Extraction errors ---
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unknown stream scope or fact id.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("Extractor timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Extraction failed: {0}")]
    Failed(String),

    #[error("Unusable extractor output: {0}")]
    UnusableOutput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_displays_correctly() {
        let err = Error::Store(StoreError::NotFound("stream project:alpha".into()));
        assert!(err.to_string().contains("project:alpha"));
        assert!(err.to_string().contains("Not found"));
    }

    #[test]
    fn extract_timeout_displays_correctly() {
        let err = Error::Extract(ExtractError::Timeout { timeout_secs: 30 });
        assert!(err.to_string().contains("30s"));
    }
}
