//! RocksDB-backed status record store.
//!
//! Keys are raw item id bytes; values are the opaque payload exactly as
//! fetched. Records are write-once: `put_all` skips ids that already have
//! a value, and nothing in the pipeline ever deletes one. Bloom filters
//! make the common "is this id known" check cheap.
//!
//! Entries are not pruned when their ledger reference ages out of
//! retention; that accumulation is a known growth concern, accepted for
//! now because records are small and rebuildable from upstream.

use crate::Result;
use roost_core::StatusRecord;
use rocksdb::{DBWithThreadMode, MultiThreaded, Options, WriteBatch, WriteOptions};
use std::collections::HashSet;
use std::path::Path;

/// Write-once, content-addressed store mapping item id to payload.
///
/// Thread-safe; share across tasks via `Arc<StatusDb>`.
pub struct StatusDb {
    db: DBWithThreadMode<MultiThreaded>,
}

impl StatusDb {
    /// Open or create a status store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening status store at {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);

        // Write-heavy workload: payloads arrive in bursts per sync cycle.
        opts.set_write_buffer_size(32 * 1024 * 1024);
        opts.set_max_write_buffer_number(2);

        // Bloom filters for fast "not seen" lookups during dedup.
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.increase_parallelism(num_cpus::get().min(4) as i32);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Open a secondary (read) instance against a primary opened by the
    /// sync daemon. Call [`StatusDb::catch_up`] to pick up its writes.
    pub fn open_secondary<P: AsRef<Path>>(primary: P, secondary: P) -> Result<Self> {
        let opts = Options::default();
        let db = DBWithThreadMode::<MultiThreaded>::open_as_secondary(
            &opts,
            primary.as_ref(),
            secondary.as_ref(),
        )?;
        Ok(Self { db })
    }

    /// Catch a secondary instance up with the primary's latest writes.
    pub fn catch_up(&self) -> Result<()> {
        self.db.try_catch_up_with_primary()?;
        Ok(())
    }

    /// Fetch one payload by item id.
    pub fn get(&self, item_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(item_id.as_bytes())?)
    }

    /// Approximate number of stored records.
    pub fn approximate_count(&self) -> Result<u64> {
        let count = self
            .db
            .property_int_value("rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(count)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl super::StatusStore for StatusDb {
    fn get_existing(&self, item_ids: &[String]) -> Result<HashSet<String>> {
        let mut present = HashSet::new();
        let results = self.db.multi_get(item_ids.iter().map(|id| id.as_bytes()));
        for (id, result) in item_ids.iter().zip(results) {
            if result?.is_some() {
                present.insert(id.clone());
            }
        }
        Ok(present)
    }

    fn put_all(&self, records: &[StatusRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Records are immutable once written; re-sent ids keep their
        // original payload.
        let existing = self.get_existing(
            &records
                .iter()
                .map(|r| r.item_id.clone())
                .collect::<Vec<_>>(),
        )?;

        let mut batch = WriteBatch::default();
        let mut written = 0usize;
        for record in records {
            if existing.contains(&record.item_id) {
                continue;
            }
            batch.put(record.item_id.as_bytes(), &record.payload);
            written += 1;
        }

        if written > 0 {
            let mut write_opts = WriteOptions::default();
            write_opts.set_sync(true);
            self.db.write_opt(batch, &write_opts)?;
            tracing::debug!("Stored {} new status records", written);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StatusStore;
    use tempfile::TempDir;

    fn record(id: &str, payload: &[u8]) -> StatusRecord {
        StatusRecord::new(id, payload.to_vec())
    }

    #[test]
    fn open_and_close() {
        let tmp = TempDir::new().unwrap();
        let _db = StatusDb::open(tmp.path()).unwrap();
    }

    #[test]
    fn put_all_and_get_existing() {
        let tmp = TempDir::new().unwrap();
        let db = StatusDb::open(tmp.path()).unwrap();

        db.put_all(&[record("1", b"one"), record("2", b"two")])
            .unwrap();

        let existing = db
            .get_existing(&["1".to_string(), "2".to_string(), "3".to_string()])
            .unwrap();
        assert!(existing.contains("1"));
        assert!(existing.contains("2"));
        assert!(!existing.contains("3"));
    }

    #[test]
    fn records_are_write_once() {
        let tmp = TempDir::new().unwrap();
        let db = StatusDb::open(tmp.path()).unwrap();

        db.put_all(&[record("1", b"original")]).unwrap();
        db.put_all(&[record("1", b"changed"), record("2", b"new")])
            .unwrap();

        assert_eq!(db.get("1").unwrap().unwrap(), b"original");
        assert_eq!(db.get("2").unwrap().unwrap(), b"new");
    }

    #[test]
    fn get_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let db = StatusDb::open(tmp.path()).unwrap();
        assert!(db.get("nope").unwrap().is_none());
    }

    #[test]
    fn empty_put_is_a_noop() {
        let tmp = TempDir::new().unwrap();
        let db = StatusDb::open(tmp.path()).unwrap();
        db.put_all(&[]).unwrap();
        assert_eq!(db.approximate_count().unwrap(), 0);
    }
}
