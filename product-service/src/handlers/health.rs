use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::get_metrics;
use crate::startup::AppState;

/// Liveness probe reporting datastore connectivity.
///
/// A pure read of the connection state the connection manager maintains; no
/// I/O happens on this path and it never fails.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.db.state().is_connected() {
        (
            StatusCode::OK,
            Json(json!({ "status": "OK", "database": "connected" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "NOT OK", "database": "disconnected" })),
        )
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
