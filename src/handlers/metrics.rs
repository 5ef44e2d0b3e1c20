use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use crate::metrics::{RATE_LIMIT_KEYS, render};
use crate::state::AppState;

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    RATE_LIMIT_KEYS.set(state.gate.tracked_keys() as f64);
    render().map_err(|e| {
        tracing::error!(error = %e, "failed to encode metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics")
    })
}
