//! Loan metrics endpoint

use axum::{extract::State, Json};

use crate::metrics::MetricsSnapshot;

/// Current loan counters
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "metrics",
    responses(
        (status = 200, description = "Loan metrics snapshot", body = MetricsSnapshot)
    )
)]
pub async fn get_metrics(State(state): State<crate::AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
