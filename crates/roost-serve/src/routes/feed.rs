//! The feed endpoint.
//!
//! Resolves an opaque feed id to a mirrored identity, selects the window
//! of ledger entries this consumer should see, and renders it in the
//! requested format. Conditional requests use If-Modified-Since against
//! the newest ledger entry.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, TimeZone, Utc};
use roost_core::{Identity, LedgerEntry};
use roost_sync::store::LedgerStore;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::format::FeedFormat;
use crate::state::AppState;
use crate::window::{select_window, ConsumerContext, WindowSelection};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Response format: "atom" (default) or "json".
    output: Option<String>,
}

pub async fn serve_feed(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let format = FeedFormat::parse(query.output.as_deref()).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "unknown output format '{}'",
            query.output.as_deref().unwrap_or_default()
        ))
    })?;

    let identity = state
        .resolver
        .resolve(&feed_id)
        .ok_or_else(|| ApiError::NotFound(format!("no feed '{feed_id}'")))?;

    state.catch_up()?;
    let ledger = state.ledgers.get(&identity)?;

    let consumer = ConsumerContext {
        user_agent: header_str(&headers, header::USER_AGENT).map(str::to_string),
        last_seen: header_str(&headers, header::IF_MODIFIED_SINCE).and_then(parse_http_date),
    };
    let now = Utc::now().timestamp() as u64;

    let (entries, publicly_cacheable) =
        match select_window(&ledger, now, &consumer, &state.window) {
            WindowSelection::NotModified => {
                return Ok(StatusCode::NOT_MODIFIED.into_response());
            }
            WindowSelection::Window {
                entries,
                publicly_cacheable,
            } => (entries, publicly_cacheable),
        };

    tracing::debug!(
        feed_id = %feed_id,
        identity = %identity,
        entries = entries.len(),
        format = ?format,
        "serving feed window"
    );

    let body = match format {
        FeedFormat::Atom => render_atom(&feed_id, &identity, &entries, now),
        FeedFormat::DebugJson => render_debug_json(&state, &identity, &entries)?,
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(if publicly_cacheable {
            "public, max-age=60"
        } else {
            "private, no-cache"
        }),
    );
    if let Some(newest) = ledger.newest_timestamp() {
        if let Ok(value) = HeaderValue::from_str(&http_date(newest)) {
            response_headers.insert(header::LAST_MODIFIED, value);
        }
    }

    Ok((StatusCode::OK, response_headers, body).into_response())
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parse an HTTP-date header value to Unix seconds. Malformed values are
/// treated as absent rather than rejected.
fn parse_http_date(value: &str) -> Option<u64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.timestamp())
        .filter(|ts| *ts >= 0)
        .map(|ts| ts as u64)
}

/// Format Unix seconds as an HTTP-date (IMF-fixdate).
fn http_date(ts: u64) -> String {
    match Utc.timestamp_opt(ts as i64, 0).single() {
        Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    }
}

fn rfc3339(ts: u64) -> String {
    match Utc.timestamp_opt(ts as i64, 0).single() {
        Some(dt) => dt.to_rfc3339(),
        None => Utc::now().to_rfc3339(),
    }
}

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Render the Atom envelope: feed metadata plus id/updated per entry.
/// Mirrored payload bodies are not rendered into entries.
fn render_atom(feed_id: &str, identity: &Identity, entries: &[LedgerEntry], now: u64) -> String {
    let updated = entries.first().map(|e| e.timestamp).unwrap_or(now);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    out.push_str(&format!(
        "  <id>urn:roost:feed:{}</id>\n",
        xml_escape(feed_id)
    ));
    out.push_str(&format!(
        "  <title>Timeline for {}</title>\n",
        xml_escape(identity.as_str())
    ));
    out.push_str(&format!("  <updated>{}</updated>\n", rfc3339(updated)));

    for entry in entries {
        out.push_str("  <entry>\n");
        out.push_str(&format!(
            "    <id>urn:roost:status:{}</id>\n",
            xml_escape(&entry.item_id)
        ));
        out.push_str(&format!(
            "    <title>{}</title>\n",
            xml_escape(&entry.item_id)
        ));
        out.push_str(&format!(
            "    <updated>{}</updated>\n",
            rfc3339(entry.timestamp)
        ));
        out.push_str("  </entry>\n");
    }

    out.push_str("</feed>\n");
    out
}

/// Render the debug JSON form: ledger entries joined with their stored
/// payloads. Payloads that cannot be found or parsed render as null.
fn render_debug_json(
    state: &AppState,
    identity: &Identity,
    entries: &[LedgerEntry],
) -> Result<String, ApiError> {
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let payload = state
            .statuses
            .get(&entry.item_id)?
            .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok());
        items.push(json!({
            "item_id": entry.item_id,
            "timestamp": entry.timestamp,
            "payload": payload,
        }));
    }

    let body = json!({
        "identity": identity.as_str(),
        "entries": items,
    });
    serde_json::to_string_pretty(&body).map_err(|e| ApiError::Internal(e.into()))
}
