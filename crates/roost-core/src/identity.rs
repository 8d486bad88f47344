//! Identity handle for a mirrored upstream account.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle for one upstream account being mirrored.
///
/// An identity owns exactly one stream ledger and one published feed.
/// The handle itself carries no meaning to this system; it is whatever
/// the upstream source uses to key a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from an upstream account handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The raw handle, as used in store keys and log messages.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

impl From<String> for Identity {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}
