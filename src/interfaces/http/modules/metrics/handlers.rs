//! Prometheus scrape endpoint
//!
//! Renders the global `metrics-exporter-prometheus` recorder. Live running
//! cost is not event driven, so it is sampled here on every scrape.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics::gauge;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::prelude::ToPrimitive;

use crate::application::SharedVenueRegistry;

#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub registry: SharedVenueRegistry,
}

/// `GET /metrics` (no auth)
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    for service in state.registry.all() {
        let board = service.live_board().await;
        let running_cost: f64 = board
            .stations
            .iter()
            .filter_map(|s| s.live_cost.to_f64())
            .sum();
        gauge!("ledger_running_cost_tnd", "venue" => board.venue_id).set(running_cost);
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.handle.render(),
    )
}
