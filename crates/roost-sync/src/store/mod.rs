//! Persistent stores: status records and per-identity ledgers.
//!
//! Two independent stores back the pipeline:
//!
//! - [`StatusDb`] - write-once, content-addressed payload store keyed by
//!   item id
//! - [`LedgerDb`] - per-identity ordered (item id, timestamp) ledger,
//!   overwritten atomically as a whole on each sync
//!
//! There is no transaction spanning the two. The engine's write ordering
//! (status records first, ledger second) is the only cross-store safety
//! mechanism, which is why the traits below are the exact seams the
//! engine is tested against.

mod ledger;
mod status;

pub use ledger::LedgerDb;
pub use status::StatusDb;

use crate::Result;
use roost_core::{Identity, Ledger, StatusRecord};
use std::collections::HashSet;

/// Write-once store of full item payloads.
pub trait StatusStore: Send + Sync {
    /// Of the given ids, return the subset that already has a record.
    fn get_existing(&self, item_ids: &[String]) -> Result<HashSet<String>>;

    /// Idempotent bulk upsert; all-or-nothing per call. Existing records
    /// are never overwritten (id equality implies content equality).
    fn put_all(&self, records: &[StatusRecord]) -> Result<()>;
}

/// Store of per-identity stream ledgers.
pub trait LedgerStore: Send + Sync {
    /// The identity's ledger, or an empty one if never synced.
    fn get(&self, identity: &Identity) -> Result<Ledger>;

    /// Overwrite the identity's ledger in a single atomic write.
    fn put(&self, identity: &Identity, ledger: &Ledger) -> Result<()>;
}
