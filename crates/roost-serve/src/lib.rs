//! Roost serve - the feed read endpoint.
//!
//! Serves windowed views of mirrored timelines as subscribable feeds.
//! Reads go against secondary RocksDB instances of the sync daemon's
//! stores, so this process never writes and never blocks a sync.
//!
//! # Architecture
//!
//! - **AppState**: shared state (secondary store handles, feed directory,
//!   window configuration)
//! - **window**: the feed window selector (full window, minimum-count
//!   floor, frequent-poller overlap mode, not-modified signalling)
//! - **format**: response-format dispatch (Atom envelope vs debug JSON)
//! - **routes**: endpoint handlers

pub mod error;
pub mod format;
mod routes;
mod state;
pub mod window;

pub use error::ApiError;
pub use format::FeedFormat;
pub use routes::router;
pub use state::{AppState, Config};
pub use window::{select_window, ConsumerContext, WindowConfig, WindowSelection};
