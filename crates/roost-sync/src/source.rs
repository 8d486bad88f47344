//! Upstream timeline source boundary.
//!
//! The engine only ever sees the [`UpstreamSource`] trait: give me a page
//! of items for this identity, strictly newer than a cursor. The provided
//! [`HttpUpstreamSource`] speaks a plain JSON-over-HTTP protocol; tests
//! substitute in-memory fixtures at the same seam.
//!
//! Transport errors, timeouts, and malformed payloads all surface as
//! [`Error::UpstreamFetch`]; the engine treats any of them as "no update
//! this cycle" and does not retry on its own.

use crate::error::{Error, Result};
use roost_core::Identity;
use std::time::Duration;

/// One timeline item as fetched from upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedItem {
    /// Upstream item id.
    pub id: String,
    /// Item creation time, seconds since the Unix epoch.
    pub timestamp: u64,
    /// Raw item bytes, stored verbatim as the status record payload.
    pub payload: Vec<u8>,
}

/// Fetches a page of timeline items newer than a given cursor.
#[allow(async_fn_in_trait)]
pub trait UpstreamSource {
    /// Fetch up to `max_count` items for `identity`, strictly newer than
    /// `cursor` (or the newest available page when `cursor` is `None`).
    /// Items are returned in upstream order, newest first.
    async fn fetch_since(
        &self,
        identity: &Identity,
        cursor: Option<&str>,
        max_count: usize,
    ) -> Result<Vec<FetchedItem>>;
}

/// HTTP adapter for a JSON timeline API.
///
/// Expects `GET {base_url}/timeline/{identity}?count=N[&since_id=C]` to
/// return a JSON array of item objects, each carrying an `id` (string or
/// integer) and a `timestamp` (Unix seconds). The full item object is
/// kept verbatim as the payload.
pub struct HttpUpstreamSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpstreamSource {
    /// Build an adapter with a bounded per-request deadline.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("building upstream HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl UpstreamSource for HttpUpstreamSource {
    async fn fetch_since(
        &self,
        identity: &Identity,
        cursor: Option<&str>,
        max_count: usize,
    ) -> Result<Vec<FetchedItem>> {
        let url = format!("{}/timeline/{}", self.base_url, identity);

        let mut request = self
            .client
            .get(&url)
            .query(&[("count", max_count.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("since_id", cursor)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::UpstreamFetch(format!("requesting {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamFetch(format!(
                "{url} returned status {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::UpstreamFetch(format!("reading {url}: {e}")))?;

        parse_timeline(&body)
    }
}

/// Parse a JSON timeline page into fetched items.
///
/// Kept separate from the transport so malformed-payload handling is
/// testable without a server.
pub(crate) fn parse_timeline(body: &[u8]) -> Result<Vec<FetchedItem>> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| Error::UpstreamFetch(format!("malformed timeline payload: {e}")))?;

    let mut items = Vec::with_capacity(values.len());
    for value in values {
        let id = match value.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::UpstreamFetch(
                    "timeline item missing id".to_string(),
                ))
            }
        };
        let timestamp = value
            .get("timestamp")
            .and_then(|t| t.as_u64())
            .ok_or_else(|| {
                Error::UpstreamFetch(format!("timeline item {id} missing timestamp"))
            })?;
        let payload = serde_json::to_vec(&value)?;
        items.push(FetchedItem {
            id,
            timestamp,
            payload,
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_numeric_ids() {
        let body = br#"[
            {"id": "901", "timestamp": 1700000300, "text": "newest"},
            {"id": 900, "timestamp": 1700000200, "text": "older"}
        ]"#;
        let items = parse_timeline(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "901");
        assert_eq!(items[1].id, "900");
        assert_eq!(items[0].timestamp, 1_700_000_300);
    }

    #[test]
    fn payload_keeps_the_whole_item() {
        let body = br#"[{"id": "1", "timestamp": 10, "text": "hello"}]"#;
        let items = parse_timeline(body).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&items[0].payload).unwrap();
        assert_eq!(value["text"], "hello");
    }

    #[test]
    fn malformed_json_is_a_fetch_error() {
        let err = parse_timeline(b"{not json").unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch(_)));
    }

    #[test]
    fn missing_fields_are_fetch_errors() {
        let err = parse_timeline(br#"[{"timestamp": 10}]"#).unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch(msg) if msg.contains("missing id")));

        let err = parse_timeline(br#"[{"id": "1"}]"#).unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch(msg) if msg.contains("missing timestamp")));
    }

    #[test]
    fn empty_page_parses() {
        assert!(parse_timeline(b"[]").unwrap().is_empty());
    }
}
