//! The per-identity stream ledger.
//!
//! A ledger is the authoritative record of which items are known for an
//! identity and when they happened. It is an ordered list of
//! (item id, timestamp) pairs, maintained newest-known-first by
//! construction. The order is not guaranteed to be strictly time-sorted:
//! upstream sources deliver out of order, and the merge step preserves
//! fetch order for new items.
//!
//! Invariant: no item id appears twice. The ledger must also never
//! reference an item id without a stored status record; upholding that is
//! the sync engine's write-ordering job, not this type's.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One known item: its upstream id and its upstream timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Upstream item id. Opaque; compared only for equality.
    pub item_id: String,
    /// Item creation time, seconds since the Unix epoch.
    pub timestamp: u64,
}

impl LedgerEntry {
    /// Convenience constructor, mostly for tests and fixtures.
    pub fn new(item_id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            item_id: item_id.into(),
            timestamp,
        }
    }
}

/// Result of merging freshly fetched entries into a ledger.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged ledger, new entries first, retention applied.
    pub ledger: Ledger,
    /// Entries dropped from the tail by the retention window.
    pub dropped: usize,
}

/// Ordered, deduplicated list of items known for one identity.
///
/// Decoding goes through [`Ledger::from_entries`], so a persisted ledger
/// that somehow acquired duplicate ids is rejected rather than served.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LedgerRepr")]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

/// Raw wire shape of a ledger, validated on the way in.
#[derive(Deserialize)]
struct LedgerRepr {
    entries: Vec<LedgerEntry>,
}

impl TryFrom<LedgerRepr> for Ledger {
    type Error = Error;

    fn try_from(repr: LedgerRepr) -> Result<Self> {
        Ledger::from_entries(repr.entries)
    }
}

impl Ledger {
    /// An empty ledger, as returned for identities never yet synced.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from entries, validating the no-duplicates invariant.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.item_id.as_str()) {
                return Err(Error::DuplicateItemId(entry.item_id.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Entries in newest-known-first order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The set of item ids this ledger knows about.
    pub fn item_ids(&self) -> HashSet<String> {
        self.entries.iter().map(|e| e.item_id.clone()).collect()
    }

    /// Timestamp of the newest entry, if any.
    ///
    /// "Newest" here means maximal timestamp, not head position: the head
    /// is newest-known, which can lag an out-of-order arrival.
    pub fn newest_timestamp(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.timestamp).max()
    }

    /// Pick the fetch cursor for an incremental sync.
    ///
    /// Scans newest-first and returns the first entry at least
    /// `recent_window_secs` old. Entries younger than that are
    /// deliberately re-requested as a trailing overlap, so an upstream
    /// item delivered out of order within the window is still picked up.
    /// Returns `None` when the ledger is empty or every entry is recent,
    /// in which case the caller fetches without a cursor.
    pub fn since_cursor(&self, now: u64, recent_window_secs: u64) -> Option<&str> {
        let threshold = now.saturating_sub(recent_window_secs);
        self.entries
            .iter()
            .find(|e| e.timestamp <= threshold)
            .map(|e| e.item_id.as_str())
    }

    /// Merge new entries in front of the existing ones and apply retention.
    ///
    /// `new_entries` need not be deduplicated: ids already in this ledger
    /// and ids repeated within `new_entries` itself are both skipped, so
    /// the no-duplicates invariant holds even for an upstream page that
    /// carries the same id twice. Existing entries older than
    /// `retention_secs` are dropped from the tail. No minimum-count floor
    /// is applied here; the floor is a serving-time concern of the window
    /// selector.
    pub fn merged_with(
        &self,
        new_entries: Vec<LedgerEntry>,
        now: u64,
        retention_secs: u64,
    ) -> MergeOutcome {
        let mut seen: HashSet<String> =
            self.entries.iter().map(|e| e.item_id.clone()).collect();

        let mut combined: Vec<LedgerEntry> = new_entries
            .into_iter()
            .filter(|e| seen.insert(e.item_id.clone()))
            .collect();

        let threshold = now.saturating_sub(retention_secs);
        let mut dropped = 0usize;
        for entry in &self.entries {
            if entry.timestamp >= threshold {
                combined.push(entry.clone());
            } else {
                dropped += 1;
            }
        }

        MergeOutcome {
            ledger: Ledger { entries: combined },
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 3600;
    const DAY: u64 = 24 * HOUR;

    fn ledger(entries: &[(&str, u64)]) -> Ledger {
        Ledger::from_entries(
            entries
                .iter()
                .map(|(id, ts)| LedgerEntry::new(*id, *ts))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let err = Ledger::from_entries(vec![
            LedgerEntry::new("a", 10),
            LedgerEntry::new("b", 9),
            LedgerEntry::new("a", 8),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateItemId(id) if id == "a"));
    }

    #[test]
    fn since_cursor_skips_recent_entries() {
        let now = 100_000;
        // "c" and "b" are inside the 600s overlap window, "a" is not.
        let l = ledger(&[("c", now - 30), ("b", now - 500), ("a", now - 700)]);
        assert_eq!(l.since_cursor(now, 600), Some("a"));
    }

    #[test]
    fn since_cursor_none_when_all_recent() {
        let now = 100_000;
        let l = ledger(&[("c", now - 30), ("b", now - 500)]);
        assert_eq!(l.since_cursor(now, 600), None);
        assert_eq!(Ledger::new().since_cursor(now, 600), None);
    }

    #[test]
    fn since_cursor_boundary_is_inclusive() {
        let now = 100_000;
        // Exactly recent_window old counts as old enough to anchor on.
        let l = ledger(&[("a", now - 600)]);
        assert_eq!(l.since_cursor(now, 600), Some("a"));
    }

    #[test]
    fn merge_prepends_new_and_drops_old() {
        let now = 10 * DAY;
        let l = ledger(&[("b", now - HOUR), ("a", now - 2 * DAY)]);
        let outcome = l.merged_with(vec![LedgerEntry::new("c", now - 10)], now, DAY);

        assert_eq!(outcome.dropped, 1);
        let ids: Vec<&str> = outcome
            .ledger
            .entries()
            .iter()
            .map(|e| e.item_id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn merge_skips_entries_already_known() {
        let now = 10 * DAY;
        let l = ledger(&[("b", now - HOUR)]);
        let outcome = l.merged_with(
            vec![LedgerEntry::new("b", now - HOUR), LedgerEntry::new("c", now)],
            now,
            DAY,
        );
        assert_eq!(outcome.ledger.len(), 2);
        assert!(outcome.ledger.item_ids().contains("c"));
    }

    #[test]
    fn merge_dedups_ids_repeated_within_one_batch() {
        let now = 10 * DAY;
        let l = ledger(&[("a", now - HOUR)]);
        let outcome = l.merged_with(
            vec![
                LedgerEntry::new("x", now - 200),
                LedgerEntry::new("x", now - 201),
            ],
            now,
            DAY,
        );

        let ids: Vec<&str> = outcome
            .ledger
            .entries()
            .iter()
            .map(|e| e.item_id.as_str())
            .collect();
        // The first occurrence wins; the repeat is dropped.
        assert_eq!(ids, vec!["x", "a"]);
        assert_eq!(outcome.ledger.entries()[0].timestamp, now - 200);
    }

    #[test]
    fn decoding_rejects_duplicate_ids() {
        let json = r#"{"entries":[
            {"item_id":"x","timestamp":200},
            {"item_id":"x","timestamp":201}
        ]}"#;
        assert!(serde_json::from_str::<Ledger>(json).is_err());
    }

    #[test]
    fn newest_timestamp_is_max_not_head() {
        // Head is newest-known; an out-of-order arrival can put an older
        // timestamp in front.
        let l = ledger(&[("b", 50), ("a", 80)]);
        assert_eq!(l.newest_timestamp(), Some(80));
        assert_eq!(Ledger::new().newest_timestamp(), None);
    }

    #[test]
    fn ledger_round_trips_through_json() {
        let l = ledger(&[("b", 50), ("a", 80)]);
        let json = serde_json::to_vec(&l).unwrap();
        let back: Ledger = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, l);
    }
}
