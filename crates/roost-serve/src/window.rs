//! The feed window selector.
//!
//! Given a ledger and the requesting consumer's context, decides which
//! entries to expose:
//!
//! - Baseline: everything younger than the full window, padded up to a
//!   minimum count from the next-oldest entries so a quiet timeline still
//!   produces a useful feed.
//! - Frequent pollers (matched by a user-agent allow-list) that declare a
//!   last-seen timestamp get only entries newer than that checkpoint
//!   minus a small safety overlap, with no minimum floor, and the
//!   response is marked privately cacheable only.
//! - A consumer whose declared checkpoint already covers the newest entry
//!   can be told "not modified" instead of receiving an empty window.

use roost_core::{Ledger, LedgerEntry};
use std::time::Duration;

/// Window selection policy.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Baseline window: serve entries at most this old.
    pub full_window: Duration,

    /// Minimum entries served in baseline mode, padded from beyond the
    /// window when the recent ledger is thin.
    pub min_items: usize,

    /// Safety overlap subtracted from a poller's declared checkpoint.
    pub overlap: Duration,

    /// Case-insensitive substrings identifying known frequent-polling
    /// aggregators by user agent.
    pub aggregator_user_agents: Vec<String>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            full_window: Duration::from_secs(24 * 60 * 60),
            min_items: 10,
            overlap: Duration::from_secs(60 * 60),
            aggregator_user_agents: vec!["feedfetcher".to_string()],
        }
    }
}

/// What the requesting consumer told us about itself.
#[derive(Debug, Clone, Default)]
pub struct ConsumerContext {
    /// The request's user agent, if any.
    pub user_agent: Option<String>,
    /// Declared last-seen timestamp (conditional header), Unix seconds.
    pub last_seen: Option<u64>,
}

impl ConsumerContext {
    fn is_known_aggregator(&self, config: &WindowConfig) -> bool {
        let Some(agent) = &self.user_agent else {
            return false;
        };
        let agent = agent.to_lowercase();
        config
            .aggregator_user_agents
            .iter()
            .any(|needle| agent.contains(&needle.to_lowercase()))
    }
}

/// Outcome of window selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowSelection {
    /// Serve these entries, newest-known-first.
    Window {
        entries: Vec<LedgerEntry>,
        /// Whether intermediate caches may store the response. False in
        /// poller mode, where the window depends on the checkpoint.
        publicly_cacheable: bool,
    },
    /// The consumer's checkpoint already covers everything we know.
    NotModified,
}

/// Compute the window of ledger entries to expose to this consumer.
pub fn select_window(
    ledger: &Ledger,
    now: u64,
    consumer: &ConsumerContext,
    config: &WindowConfig,
) -> WindowSelection {
    let poller_checkpoint = if consumer.is_known_aggregator(config) {
        consumer.last_seen
    } else {
        None
    };

    let mut entries = Vec::new();
    match poller_checkpoint {
        Some(last_seen) => {
            // Tight window: only what the poller has plausibly not seen,
            // with an overlap for clock skew and late arrivals. No floor.
            let threshold = last_seen.saturating_sub(config.overlap.as_secs());
            for entry in ledger.entries() {
                if entry.timestamp >= threshold {
                    entries.push(entry.clone());
                } else {
                    break;
                }
            }
        }
        None => {
            let threshold = now.saturating_sub(config.full_window.as_secs());
            for entry in ledger.entries() {
                if entry.timestamp >= threshold || entries.len() < config.min_items {
                    entries.push(entry.clone());
                } else {
                    break;
                }
            }
        }
    }

    if entries.is_empty() {
        if let (Some(last_seen), Some(newest)) = (consumer.last_seen, ledger.newest_timestamp()) {
            if last_seen >= newest {
                return WindowSelection::NotModified;
            }
        }
    }

    WindowSelection::Window {
        entries,
        publicly_cacheable: poller_checkpoint.is_none(),
    }
}
