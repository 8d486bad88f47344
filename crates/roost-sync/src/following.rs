//! Lazily refreshed "who follows whom" index.
//!
//! Ping fan-out needs to know which mirroring identities follow a given
//! author. That relation changes rarely and is expensive to load, so it
//! is cached in memory and refreshed only when older than a configured
//! max age. The clock is injected, and the loader is a trait, so both the
//! refresh policy and the data source are explicit rather than hidden
//! module state.

use crate::clock::Clock;
use crate::error::Result;
use parking_lot::Mutex;
use roost_core::Identity;
use std::collections::HashMap;
use std::time::Duration;

/// Loads the full author → followers relation.
pub trait FollowingSource: Send + Sync {
    fn load(&self) -> Result<HashMap<Identity, Vec<Identity>>>;
}

struct CachedMap {
    map: HashMap<Identity, Vec<Identity>>,
    loaded_at: u64,
}

/// In-memory follower index with a staleness-based refresh policy.
pub struct FollowingIndex<S, C> {
    source: S,
    clock: C,
    max_age: Duration,
    cache: Mutex<Option<CachedMap>>,
}

impl<S: FollowingSource, C: Clock> FollowingIndex<S, C> {
    pub fn new(source: S, clock: C, max_age: Duration) -> Self {
        Self {
            source,
            clock,
            max_age,
            cache: Mutex::new(None),
        }
    }

    /// Identities that follow `author`, refreshing the index if stale.
    ///
    /// A failed refresh falls back to the previous snapshot with a
    /// warning; only a cold cache propagates the load error.
    pub fn followers_of(&self, author: &Identity) -> Result<Vec<Identity>> {
        let now = self.clock.now();
        let mut cache = self.cache.lock();

        let stale = match cache.as_ref() {
            Some(cached) => now.saturating_sub(cached.loaded_at) >= self.max_age.as_secs(),
            None => true,
        };

        if stale {
            match self.source.load() {
                Ok(map) => {
                    tracing::debug!(authors = map.len(), "refreshed following index");
                    *cache = Some(CachedMap {
                        map,
                        loaded_at: now,
                    });
                }
                Err(e) if cache.is_some() => {
                    tracing::warn!(error = %e, "following index refresh failed, serving stale data");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(cache
            .as_ref()
            .and_then(|cached| cached.map.get(author).cloned())
            .unwrap_or_default())
    }
}
