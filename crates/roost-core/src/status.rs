//! Immutable status records: the full payload of a mirrored item.

/// Full content of one timeline item, keyed by its upstream id.
///
/// Records are write-once: the first time an item's content is fetched it
/// is stored, and it is never updated afterwards. Id equality implies
/// content equality; an upstream that re-sends an id with different bytes
/// is ignored by the store's idempotent upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Upstream item id; the store key.
    pub item_id: String,
    /// Opaque payload bytes, exactly as fetched. For JSON upstreams this
    /// is the raw item object, which the debug endpoints re-serve as-is.
    pub payload: Vec<u8>,
}

impl StatusRecord {
    pub fn new(item_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            item_id: item_id.into(),
            payload,
        }
    }
}
