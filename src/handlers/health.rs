//! Health check endpoint handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/herakles-io/herakles-compute-meter | More info: https://www.herakles.io";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.health_stats.record_http_request();

    let status = state.status.read().await.clone();

    // Healthy once a cycle has completed and the last one did not fail
    let code = if status.update_success && status.last_updated.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = if status.is_updating {
        "OK - Cycle running"
    } else if status.update_success {
        "OK"
    } else if status.last_updated.is_none() {
        "No cycle completed yet"
    } else {
        "Instance discovery failed"
    };

    let last = status
        .last_updated
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    let table = state.health_stats.render_table();

    debug!("Health check: {} - {}", code, message);
    (
        code,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\nlast cycle: {last}\n\n{table}\n{FOOTER_TEXT}"),
    )
}
