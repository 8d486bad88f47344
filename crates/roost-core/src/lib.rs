//! Core types and pure logic for the roost timeline mirror.
//!
//! This crate provides:
//! - Identity and ledger domain types shared by the sync and serve crates
//! - Pure ledger operations: cursor selection, dedup-aware merge, retention
//! - The immutable status record type stored by the sync pipeline
//! - Shared error types
//!
//! Everything here is I/O-free; persistence and networking live in
//! `roost-sync` and `roost-serve`.

mod error;
mod identity;
mod ledger;
mod status;

pub use error::{Error, Result};
pub use identity::Identity;
pub use ledger::{Ledger, LedgerEntry, MergeOutcome};
pub use status::StatusRecord;
