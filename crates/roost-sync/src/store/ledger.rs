//! RocksDB-backed ledger store.
//!
//! One key per identity (the raw handle bytes), value = the whole ledger
//! as JSON. Each sync replaces the value in a single write, so readers
//! always observe a complete ledger: either the pre-sync one or the
//! post-sync one, never a partial merge.

use crate::Result;
use roost_core::{Identity, Ledger};
use rocksdb::{DBWithThreadMode, IteratorMode, MultiThreaded, Options, WriteOptions};
use std::path::Path;

/// Per-identity stream ledger store.
///
/// Thread-safe; share across tasks via `Arc<LedgerDb>`.
pub struct LedgerDb {
    db: DBWithThreadMode<MultiThreaded>,
}

impl LedgerDb {
    /// Open or create a ledger store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening ledger store at {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.increase_parallelism(num_cpus::get().min(4) as i32);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Open a secondary (read) instance against a primary opened by the
    /// sync daemon. Call [`LedgerDb::catch_up`] to pick up its writes.
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

    /// All identities with a ledger, for the cron sweep.
    pub fn identities(&self) -> Result<Vec<Identity>> {
        let mut identities = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, _) = item?;
            identities.push(Identity::new(String::from_utf8_lossy(&key).into_owned()));
        }
        Ok(identities)
    }

    /// Approximate number of ledgers, i.e. identities.
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

impl super::LedgerStore for LedgerDb {
    fn get(&self, identity: &Identity) -> Result<Ledger> {
        match self.db.get(identity.as_str().as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Ledger::new()),
        }
    }

    fn put(&self, identity: &Identity, ledger: &Ledger) -> Result<()> {
        let bytes = serde_json::to_vec(ledger)?;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db
            .put_opt(identity.as_str().as_bytes(), bytes, &write_opts)?;
        Ok(())
    }
}
