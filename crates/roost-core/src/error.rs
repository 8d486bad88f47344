//! Error types shared across the roost crates.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core ledger operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A ledger was constructed or decoded with a repeated item id.
    #[error("duplicate item id in ledger: {0}")]
    DuplicateItemId(String),

    /// JSON encoding/decoding error (ledgers are persisted as JSON).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
