//! Roost sync pipeline components.
//!
//! This crate continuously mirrors a remote, append-mostly timeline into a
//! local per-identity ledger and notifies a subscription hub when a feed's
//! content changes.
//!
//! # Modules
//!
//! - [`engine`] - The sync engine: incremental fetch, dedup, merge, retention
//! - [`store`] - RocksDB-backed status store and ledger store
//! - [`source`] - Upstream timeline source boundary (trait + HTTP adapter)
//! - [`hub`] - Batched, fire-and-forget hub change notifications
//! - [`ping`] - Ping-triggered re-check state machine with bounded retries
//! - [`following`] - Lazily refreshed "who follows whom" index
//! - [`lock`] - Per-identity mutual exclusion for sync invocations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │    Cron Sweep    │      │   Inbound Ping   │
//! │ (all identities) │      │ (author, item)   │
//! └────────┬─────────┘      └────────┬─────────┘
//!          │                         │ fan-out via FollowingIndex
//!          ▼                         ▼
//!          ┌───────────────────────────┐
//!          │        SyncEngine         │  per-identity lock,
//!          │  fetch → dedup → merge    │  status-store-first
//!          └───┬───────────────┬───────┘  write ordering
//!              │               │
//!              ▼               ▼
//!      ┌──────────────┐ ┌──────────────┐
//!      │  StatusDb    │ │  LedgerDb    │
//!      │ (write-once) │ │ (per-ident.) │
//!      └──────────────┘ └──────┬───────┘
//!                              │ had updates
//!                              ▼
//!                       ┌──────────────┐
//!                       │ HubNotifier  │  batched POSTs,
//!                       │ (best-effort)│  at most once
//!                       └──────────────┘
//! ```
//!
//! The pipeline is ledger-last: status records are written before the
//! ledger references them, so a crash between the two writes leaves the
//! new ids undiscovered rather than dangling, and the next sync heals.

pub mod clock;
pub mod directory;
pub mod engine;
pub mod error;
pub mod following;
pub mod hub;
pub mod lock;
pub mod ping;
pub mod source;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{FeedDirectory, FeedResolver};
pub use engine::{SyncConfig, SyncEngine, SyncOutcome};
pub use error::{Error, Result};
pub use following::{FollowingIndex, FollowingSource};
pub use hub::{HttpHubTransport, HubNotifier, HubTransport, NotifyStats, DEFAULT_HUB_BATCH_SIZE};
pub use lock::IdentityLocks;
pub use ping::{fan_out, run_ping_check, Ping, PingCheck, PingConfig, PingOutcome};
pub use source::{FetchedItem, HttpUpstreamSource, UpstreamSource};
pub use store::{LedgerDb, LedgerStore, StatusDb, StatusStore};
