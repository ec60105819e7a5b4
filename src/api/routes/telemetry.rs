//! Telemetry snapshot endpoint

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

use crate::api::state::ApiState;

/// GET /api/telemetry
///
/// Returns a copy of the current snapshot. The dashboard polls this, so the
/// response must never be served from a cache.
pub async fn get_telemetry(State(state): State<ApiState>) -> Response {
    let snapshot = state.store.read().await;

    let mut response = Json(snapshot).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
