//! Single-status debug lookup.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Return the mirrored payload for one item id, pretty-printed when it
/// parses as JSON and verbatim otherwise.
pub async fn lookup_status(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Response, ApiError> {
    state.catch_up()?;

    let payload = state
        .statuses
        .get(&item_id)?
        .ok_or_else(|| ApiError::NotFound(format!("no status '{item_id}'")))?;

    let body = match serde_json::from_slice::<serde_json::Value>(&payload) {
        Ok(value) => serde_json::to_vec_pretty(&value).unwrap_or(payload),
        Err(_) => payload,
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok((StatusCode::OK, headers, body).into_response())
}
