//! Feed id ↔ identity directory.
//!
//! Feeds are published under rotatable opaque ids, not identity handles.
//! Session management owns that mapping; this directory is the minimal
//! read-only view of it that the daemon (identity → feed URL for hub
//! pings) and the serve side (feed id → identity for reads) both need.
//! It is loaded once from configuration.

use crate::error::{Error, Result};
use roost_core::Identity;
use std::collections::HashMap;

/// Resolves an opaque feed id to the identity it serves.
///
/// The serve side depends on this boundary rather than on a concrete
/// directory, so a session-backed resolver can replace the static map
/// without touching the handlers.
pub trait FeedResolver: Send + Sync {
    fn resolve(&self, feed_id: &str) -> Option<Identity>;
}

/// Bidirectional feed-id/identity lookup.
#[derive(Debug, Clone, Default)]
pub struct FeedDirectory {
    by_feed_id: HashMap<String, Identity>,
    by_identity: HashMap<Identity, String>,
}

impl FeedDirectory {
    /// Parse a `feed_id=identity` comma-separated list, the format used
    /// by the `ROOST_FEED_MAP` configuration value.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut directory = Self::default();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (feed_id, identity) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("feed map entry '{pair}' is not feed_id=identity")))?;
            let feed_id = feed_id.trim();
            let identity = Identity::new(identity.trim());
            if feed_id.is_empty() || identity.as_str().is_empty() {
                return Err(Error::Config(format!("feed map entry '{pair}' has an empty side")));
            }
            if directory.by_feed_id.insert(feed_id.to_string(), identity.clone()).is_some() {
                return Err(Error::Config(format!("feed id '{feed_id}' mapped twice")));
            }
            directory.by_identity.insert(identity, feed_id.to_string());
        }
        Ok(directory)
    }

    /// Resolve an opaque feed id to the identity it serves.
    pub fn identity_for(&self, feed_id: &str) -> Option<&Identity> {
        self.by_feed_id.get(feed_id)
    }

    /// The published feed id for an identity, if one exists.
    pub fn feed_id_for(&self, identity: &Identity) -> Option<&str> {
        self.by_identity.get(identity).map(String::as_str)
    }

    /// Every identity with a published feed.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.by_identity.keys()
    }

    pub fn len(&self) -> usize {
        self.by_feed_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_feed_id.is_empty()
    }
}

impl FeedResolver for FeedDirectory {
    fn resolve(&self, feed_id: &str) -> Option<Identity> {
        self.identity_for(feed_id).cloned()
    }
}
