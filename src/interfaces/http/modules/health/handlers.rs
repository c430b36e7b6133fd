//! Health check handler

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::application::SharedVenueRegistry;

#[derive(Clone)]
pub struct HealthState {
    pub registry: SharedVenueRegistry,
    pub started_at: Arc<Instant>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when a ledger has unsaved changes
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub venues: Vec<VenueHealth>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VenueHealth {
    pub id: String,
    pub backend: String,
    pub persisted: bool,
    pub running: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "All ledgers saved", body = HealthResponse),
        (status = 503, description = "A ledger is ahead of its stored copy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let mut venues = Vec::with_capacity(state.registry.len());
    for service in state.registry.all() {
        venues.push(VenueHealth {
            id: service.venue().id.clone(),
            backend: service.backend_name().to_string(),
            persisted: service.is_persisted(),
            running: service.snapshot().await.running_count(),
        });
    }

    let healthy = venues.iter().all(|v| v.persisted);
    let (status, label) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            venues,
        }),
    )
}
