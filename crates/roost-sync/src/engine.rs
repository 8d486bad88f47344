//! The sync engine: fetch → dedup → merge → persist.
//!
//! One [`SyncEngine::sync`] call brings a single identity's ledger up to
//! date with upstream. The engine has no cross-store transaction; its
//! failure-safety contract is write ordering alone:
//!
//! 1. status records for unseen items are bulk-upserted first
//! 2. only then is the merged ledger written, as one atomic overwrite
//!
//! If step 1 fails, the ledger still lacks the new ids, so the next cycle
//! re-discovers exactly the same items and retries. If step 2 fails, the
//! extra status records are harmless (write-once, idempotent). Either
//! way the ledger never references a payload that was not stored.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::lock::IdentityLocks;
use crate::source::UpstreamSource;
use crate::store::{LedgerStore, StatusStore};
use roost_core::{Identity, LedgerEntry, StatusRecord};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Tuning knobs for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Entries younger than this are re-requested as a trailing overlap,
    /// to tolerate upstream out-of-order delivery.
    pub recent_window: Duration,

    /// Ledger entries older than this are dropped at merge time. Must be
    /// at least as large as the serving-side full window, or served feeds
    /// would lose items the window still wants.
    pub retention_window: Duration,

    /// Maximum items requested per fetch.
    pub page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            recent_window: Duration::from_secs(10 * 60),
            retention_window: Duration::from_secs(24 * 60 * 60),
            page_size: 200,
        }
    }
}

/// What one sync cycle did.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Whether the ledger gained any entries this cycle.
    pub had_update: bool,
    /// Every item id the ledger knows after the cycle.
    pub known_item_ids: HashSet<String>,
}

/// Orchestrates fetch, dedup, merge, and persistence for one identity at
/// a time.
pub struct SyncEngine<S, P, L, C> {
    source: S,
    statuses: Arc<P>,
    ledgers: Arc<L>,
    clock: C,
    config: SyncConfig,
    locks: IdentityLocks,
}

impl<S, P, L, C> SyncEngine<S, P, L, C>
where
    S: UpstreamSource,
    P: StatusStore,
    L: LedgerStore,
    C: Clock,
{
    pub fn new(source: S, statuses: Arc<P>, ledgers: Arc<L>, clock: C, config: SyncConfig) -> Self {
        Self {
            source,
            statuses,
            ledgers,
            clock,
            config,
            locks: IdentityLocks::new(),
        }
    }

    /// Sync one identity's ledger with upstream.
    ///
    /// Upstream fetch failures are logged and reported as "no update";
    /// they are not retried here (only ping-triggered re-checks retry,
    /// and the cron sweep picks everything up eventually). Store write
    /// failures propagate as errors and self-heal on the next cycle.
    pub async fn sync(&self, identity: &Identity) -> Result<SyncOutcome> {
        let _guard = self.locks.acquire(identity).await;
        let now = self.clock.now();

        tracing::info!(identity = %identity, "syncing timeline");

        let ledger = self.ledgers.get(identity)?;
        let cursor = ledger.since_cursor(now, self.config.recent_window.as_secs());

        let fetched = match self
            .source
            .fetch_since(identity, cursor, self.config.page_size)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "upstream fetch failed, skipping cycle");
                return Ok(SyncOutcome {
                    had_update: false,
                    known_item_ids: ledger.item_ids(),
                });
            }
        };
        tracing::debug!(identity = %identity, fetched = fetched.len(), cursor = ?cursor, "fetched timeline page");

        // An upstream page can repeat an id; only the first occurrence
        // counts as new.
        let known = ledger.item_ids();
        let mut seen = known.clone();
        let new_items: Vec<_> = fetched
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect();

        if new_items.is_empty() {
            tracing::debug!(identity = %identity, "no new item ids");
            return Ok(SyncOutcome {
                had_update: false,
                known_item_ids: known,
            });
        }

        let new_ids: Vec<String> = new_items.iter().map(|i| i.id.clone()).collect();
        tracing::info!(identity = %identity, new = new_ids.len(), "new item ids for this stream");

        // Status records first. The ledger write below must not happen
        // until every id it is about to reference has a stored payload.
        let existing = self.statuses.get_existing(&new_ids)?;
        let unknown: Vec<StatusRecord> = new_items
            .iter()
            .filter(|item| !existing.contains(&item.id))
            .map(|item| StatusRecord::new(item.id.clone(), item.payload.clone()))
            .collect();
        if !unknown.is_empty() {
            self.statuses.put_all(&unknown).map_err(|e| {
                tracing::error!(identity = %identity, error = %e, "status store write failed, ledger left unadvanced");
                Error::StoreWrite(e.to_string())
            })?;
        }

        let entries: Vec<LedgerEntry> = new_items
            .iter()
            .map(|item| LedgerEntry::new(item.id.clone(), item.timestamp))
            .collect();
        let merged = ledger.merged_with(entries, now, self.config.retention_window.as_secs());
        if merged.dropped > 0 {
            tracing::debug!(identity = %identity, dropped = merged.dropped, "dropped old ledger entries");
        }

        self.ledgers.put(identity, &merged.ledger).map_err(|e| {
            tracing::error!(identity = %identity, error = %e, "ledger write failed");
            Error::LedgerWrite(e.to_string())
        })?;

        Ok(SyncOutcome {
            had_update: true,
            known_item_ids: merged.ledger.item_ids(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::FetchedItem;
    use parking_lot::Mutex;
    use roost_core::Ledger;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: u64 = 3600;
    const NOW: u64 = 1_700_000_000;

    fn item(id: &str, timestamp: u64) -> FetchedItem {
        FetchedItem {
            id: id.to_string(),
            timestamp,
            payload: format!("{{\"id\":\"{id}\"}}").into_bytes(),
        }
    }

    /// Upstream fixture: serves the same page every call, records the
    /// cursors it was asked for, and can be told to fail.
    #[derive(Default)]
    struct FixtureSource {
        items: Mutex<Vec<FetchedItem>>,
        cursors: Mutex<Vec<Option<String>>>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl FixtureSource {
        fn serving(items: Vec<FetchedItem>) -> Self {
            Self {
                items: Mutex::new(items),
                ..Self::default()
            }
        }
    }

    impl UpstreamSource for FixtureSource {
        async fn fetch_since(
            &self,
            _identity: &Identity,
            cursor: Option<&str>,
            _max_count: usize,
        ) -> Result<Vec<FetchedItem>> {
            self.cursors.lock().push(cursor.map(str::to_string));
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::UpstreamFetch("fixture says no".to_string()));
            }
            Ok(self.items.lock().clone())
        }
    }

    /// In-memory status store with an optional number of injected
    /// put failures.
    #[derive(Default)]
    struct MemStatusStore {
        records: Mutex<HashMap<String, Vec<u8>>>,
        failing_puts: AtomicUsize,
    }

    impl StatusStore for MemStatusStore {
        fn get_existing(&self, item_ids: &[String]) -> Result<HashSet<String>> {
            let records = self.records.lock();
            Ok(item_ids
                .iter()
                .filter(|id| records.contains_key(*id))
                .cloned()
                .collect())
        }

        fn put_all(&self, records: &[StatusRecord]) -> Result<()> {
            if self.failing_puts.load(Ordering::SeqCst) > 0 {
                self.failing_puts.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::StoreWrite("injected failure".to_string()));
            }
            let mut map = self.records.lock();
            for record in records {
                map.entry(record.item_id.clone())
                    .or_insert_with(|| record.payload.clone());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemLedgerStore {
        ledgers: Mutex<HashMap<Identity, Ledger>>,
    }

    impl LedgerStore for MemLedgerStore {
        fn get(&self, identity: &Identity) -> Result<Ledger> {
            Ok(self.ledgers.lock().get(identity).cloned().unwrap_or_default())
        }

        fn put(&self, identity: &Identity, ledger: &Ledger) -> Result<()> {
            self.ledgers.lock().insert(identity.clone(), ledger.clone());
            Ok(())
        }
    }

    fn engine(
        source: FixtureSource,
    ) -> SyncEngine<FixtureSource, MemStatusStore, MemLedgerStore, ManualClock> {
        SyncEngine::new(
            source,
            Arc::new(MemStatusStore::default()),
            Arc::new(MemLedgerStore::default()),
            ManualClock::at(NOW),
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn first_sync_populates_ledger_and_store() {
        let engine = engine(FixtureSource::serving(vec![
            item("2", NOW - 10),
            item("1", NOW - 20),
        ]));
        let alice = Identity::new("alice");

        let outcome = engine.sync(&alice).await.unwrap();
        assert!(outcome.had_update);
        assert_eq!(outcome.known_item_ids.len(), 2);

        let ledger = engine.ledgers.get(&alice).unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(engine.statuses.records.lock().contains_key("1"));
        assert!(engine.statuses.records.lock().contains_key("2"));
    }

    #[tokio::test]
    async fn sync_is_idempotent_with_no_new_items() {
        let engine = engine(FixtureSource::serving(vec![
            item("2", NOW - 10),
            item("1", NOW - 20),
        ]));
        let alice = Identity::new("alice");

        assert!(engine.sync(&alice).await.unwrap().had_update);
        let after_first = engine.ledgers.get(&alice).unwrap();

        let second = engine.sync(&alice).await.unwrap();
        assert!(!second.had_update);
        assert_eq!(engine.ledgers.get(&alice).unwrap(), after_first);

        let third = engine.sync(&alice).await.unwrap();
        assert!(!third.had_update);
    }

    #[tokio::test]
    async fn merge_treats_only_unseen_ids_as_new() {
        let engine = engine(FixtureSource::serving(vec![
            item("D", NOW - 5),
            item("C", NOW - 10),
            item("B", NOW - 20),
        ]));
        let alice = Identity::new("alice");

        let seeded = Ledger::from_entries(vec![
            LedgerEntry::new("C", NOW - 10),
            LedgerEntry::new("B", NOW - 20),
            LedgerEntry::new("A", NOW - 30),
        ])
        .unwrap();
        engine.ledgers.put(&alice, &seeded).unwrap();

        let outcome = engine.sync(&alice).await.unwrap();
        assert!(outcome.had_update);

        let expected: HashSet<String> = ["A", "B", "C", "D"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(outcome.known_item_ids, expected);
        assert_eq!(engine.ledgers.get(&alice).unwrap().len(), 4);
        // Only D lacked a status record, so only D was stored.
        assert_eq!(engine.statuses.records.lock().len(), 1);
    }

    #[tokio::test]
    async fn page_repeating_an_id_stores_it_once() {
        let engine = engine(FixtureSource::serving(vec![
            item("x", NOW - 5),
            item("x", NOW - 6),
            item("y", NOW - 10),
        ]));
        let alice = Identity::new("alice");

        let outcome = engine.sync(&alice).await.unwrap();
        assert!(outcome.had_update);
        assert_eq!(outcome.known_item_ids.len(), 2);

        let ledger = engine.ledgers.get(&alice).unwrap();
        let ids: Vec<&str> = ledger.entries().iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(engine.statuses.records.lock().len(), 2);
    }

    #[tokio::test]
    async fn fetch_failure_reports_no_update() {
        let source = FixtureSource::serving(vec![item("1", NOW - 10)]);
        source.fail.store(true, Ordering::SeqCst);
        let engine = engine(source);
        let alice = Identity::new("alice");

        let outcome = engine.sync(&alice).await.unwrap();
        assert!(!outcome.had_update);
        assert!(engine.ledgers.get(&alice).unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_write_failure_leaves_ledger_and_heals_next_cycle() {
        let engine = engine(FixtureSource::serving(vec![
            item("2", NOW - 10),
            item("1", NOW - 20),
        ]));
        engine.statuses.failing_puts.store(1, Ordering::SeqCst);
        let alice = Identity::new("alice");

        let err = engine.sync(&alice).await.unwrap_err();
        assert!(matches!(err, Error::StoreWrite(_)));
        // Ledger unadvanced: the same ids are still "new".
        assert!(engine.ledgers.get(&alice).unwrap().is_empty());

        // Next cycle re-discovers the same ids and succeeds.
        let outcome = engine.sync(&alice).await.unwrap();
        assert!(outcome.had_update);
        assert_eq!(outcome.known_item_ids.len(), 2);
        assert_eq!(engine.statuses.records.lock().len(), 2);
    }

    #[tokio::test]
    async fn cursor_anchors_past_the_recent_window() {
        let engine = engine(FixtureSource::serving(vec![]));
        let alice = Identity::new("alice");

        let seeded = Ledger::from_entries(vec![
            LedgerEntry::new("3", NOW - 60),
            LedgerEntry::new("2", NOW - 300),
            LedgerEntry::new("1", NOW - HOUR),
        ])
        .unwrap();
        engine.ledgers.put(&alice, &seeded).unwrap();

        engine.sync(&alice).await.unwrap();

        // "3" and "2" are inside the 600s overlap, so the fetch anchors
        // on "1" and re-requests the recent pair.
        let cursors = engine.source.cursors.lock();
        assert_eq!(cursors.as_slice(), &[Some("1".to_string())]);
    }

    #[tokio::test]
    async fn merge_applies_retention_to_the_tail() {
        let engine = engine(FixtureSource::serving(vec![item("new", NOW - 10)]));
        let alice = Identity::new("alice");

        let seeded = Ledger::from_entries(vec![
            LedgerEntry::new("young", NOW - HOUR),
            LedgerEntry::new("stale", NOW - 25 * HOUR),
        ])
        .unwrap();
        engine.ledgers.put(&alice, &seeded).unwrap();

        let outcome = engine.sync(&alice).await.unwrap();
        assert!(outcome.had_update);
        assert!(!outcome.known_item_ids.contains("stale"));

        let merged = engine.ledgers.get(&alice).unwrap();
        let ids: Vec<&str> = merged.entries().iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "young"]);
    }
}
