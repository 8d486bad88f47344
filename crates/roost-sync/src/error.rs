//! Error types for the sync pipeline.
//!
//! The variants follow the pipeline's failure taxonomy: upstream fetch
//! failures abort a cycle and are reported as "no update"; status-store
//! write failures leave the ledger unadvanced and self-heal on the next
//! cycle; notifier failures are logged and never propagated.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during timeline synchronization.
#[derive(Error, Debug)]
pub enum Error {
    /// RocksDB error from either store.
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Upstream timeline fetch failed (transport, timeout, or parse).
    #[error("upstream fetch error: {0}")]
    UpstreamFetch(String),

    /// Status store bulk upsert failed; the ledger was left untouched.
    #[error("status store write error: {0}")]
    StoreWrite(String),

    /// Ledger overwrite failed; status records already written are
    /// harmless (write-once, idempotent).
    #[error("ledger write error: {0}")]
    LedgerWrite(String),

    /// Hub notification failed. Never propagated past the notifier.
    #[error("hub notification error: {0}")]
    Notifier(String),

    /// Core ledger invariant violation (e.g. a stored ledger decoded with
    /// duplicate ids).
    #[error(transparent)]
    Core(#[from] roost_core::Error),

    /// JSON encoding/decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_fetch_display() {
        let err = Error::UpstreamFetch("connection timed out".to_string());
        let msg = err.to_string();
        assert!(msg.contains("upstream fetch error"));
        assert!(msg.contains("connection timed out"));
    }

    #[test]
    fn store_write_display() {
        let err = Error::StoreWrite("disk full".to_string());
        assert!(err.to_string().contains("status store write error"));
    }

    #[test]
    fn core_error_passes_through() {
        let core = roost_core::Error::DuplicateItemId("x".to_string());
        let err: Error = core.into();
        assert!(err.to_string().contains("duplicate item id"));
    }
}
