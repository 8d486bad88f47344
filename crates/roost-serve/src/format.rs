//! Response-format dispatch for feed requests.

/// The representation a feed is served in.
///
/// Selected by the `output` query parameter. The default is the Atom
/// envelope; the JSON form exposes raw mirrored payloads for debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    /// Atom feed envelope (the default).
    Atom,
    /// Raw ledger entries with their stored payloads, as JSON.
    DebugJson,
}

impl FeedFormat {
    /// Parse the `output` query parameter. `None` means the parameter
    /// was absent; an unrecognized value yields `None` from `parse` so
    /// the handler can reject it.
    pub fn parse(param: Option<&str>) -> Option<Self> {
        match param {
            None | Some("atom") => Some(Self::Atom),
            Some("json") => Some(Self::DebugJson),
            Some(_) => None,
        }
    }

    /// The Content-Type header value for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Atom => "application/atom+xml; charset=utf-8",
            Self::DebugJson => "application/json",
        }
    }
}
