//! API route definitions.

mod feed;
mod health;
mod status;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the complete router.
///
/// # Route Structure
///
/// - `GET /health` - Health check
/// - `GET /feed/{feed_id}` - Windowed feed for a mirrored identity
///   (`?output=atom|json`, conditional via If-Modified-Since)
/// - `GET /status/{item_id}` - Raw mirrored payload for one item
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/feed/{feed_id}", get(feed::serve_feed))
        .route("/status/{item_id}", get(status::lookup_status))
        .with_state(state)
}
