//! Venue ledger handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::warn;
use validator::Validate;

use super::dto::*;
use crate::application::SharedVenueRegistry;
use crate::domain::PlayerCount;
use crate::interfaces::http::common::{ApiError, ApiResponse, ApiResult, ValidatedJson};

#[derive(Clone)]
pub struct VenueHandlerState {
    pub registry: SharedVenueRegistry,
}

#[utoipa::path(
    get,
    path = "/api/v1/venues",
    tag = "Venues",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Configured venues", body = ApiResponse<Vec<VenueDto>>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_venues(State(state): State<VenueHandlerState>) -> ApiResult<Vec<VenueDto>> {
    let venues = state
        .registry
        .all()
        .map(|service| VenueDto::from(service.venue()))
        .collect();
    Ok(Json(ApiResponse::success(venues)))
}

#[utoipa::path(
    get,
    path = "/api/v1/venues/{venue}/ledger",
    tag = "Venues",
    security(("bearer_auth" = [])),
    params(("venue" = String, Path, description = "Venue id")),
    responses(
        (status = 200, description = "Ledger with live timers", body = ApiResponse<LedgerDto>),
        (status = 404, description = "Unknown venue")
    )
)]
pub async fn get_ledger(
    State(state): State<VenueHandlerState>,
    Path(venue): Path<String>,
) -> ApiResult<LedgerDto> {
    let service = state.registry.get(&venue)?;
    let board = service.live_board().await;
    Ok(Json(ApiResponse::success(board.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/venues/{venue}/stations/{id}/start",
    tag = "Venues",
    security(("bearer_auth" = [])),
    params(
        ("venue" = String, Path, description = "Venue id"),
        ("id" = u32, Path, description = "Station id, 1-based")
    ),
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started", body = ApiResponse<StartSessionResponse>),
        (status = 400, description = "Invalid player count"),
        (status = 404, description = "Unknown venue or station"),
        (status = 409, description = "Station already running")
    )
)]
pub async fn start_session(
    State(state): State<VenueHandlerState>,
    Path((venue, id)): Path<(String, u32)>,
    ValidatedJson(request): ValidatedJson<StartSessionRequest>,
) -> ApiResult<StartSessionResponse> {
    let service = state.registry.get(&venue)?;
    let outcome = service.start(id, request.players()?).await?;
    Ok(Json(ApiResponse::success(StartSessionResponse {
        station: StationDto::from(&outcome.value),
        persisted: outcome.persisted,
        warning: outcome.warning,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/venues/{venue}/stations/{id}/stop",
    tag = "Venues",
    security(("bearer_auth" = [])),
    params(
        ("venue" = String, Path, description = "Venue id"),
        ("id" = u32, Path, description = "Station id, 1-based")
    ),
    responses(
        (status = 200, description = "Station stopped; receipt present if it was running", body = ApiResponse<StopSessionResponse>),
        (status = 404, description = "Unknown venue or station")
    )
)]
pub async fn stop_session(
    State(state): State<VenueHandlerState>,
    Path((venue, id)): Path<(String, u32)>,
) -> ApiResult<StopSessionResponse> {
    let service = state.registry.get(&venue)?;
    let outcome = service.stop(id).await?;
    let ticket = outcome
        .value
        .as_ref()
        .map(|r| r.render_ticket(service.venue(), service.zone()));
    Ok(Json(ApiResponse::success(StopSessionResponse {
        receipt: outcome.value.as_ref().map(ReceiptDto::from),
        ticket,
        revenue: outcome.revenue,
        persisted: outcome.persisted,
        warning: outcome.warning,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/venues/{venue}/reset",
    tag = "Venues",
    security(("bearer_auth" = [])),
    params(("venue" = String, Path, description = "Venue id")),
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Ledger reset", body = ApiResponse<ResetResponse>),
        (status = 400, description = "Reset not confirmed"),
        (status = 404, description = "Unknown venue")
    )
)]
pub async fn reset_ledger(
    State(state): State<VenueHandlerState>,
    Path(venue): Path<String>,
    ValidatedJson(request): ValidatedJson<ResetRequest>,
) -> ApiResult<ResetResponse> {
    let service = state.registry.get(&venue)?;
    if !request.confirm {
        warn!(venue = %venue, "Unconfirmed reset rejected");
        return Err(ApiError::bad_request("Reset requires confirm: true"));
    }
    let outcome = service.reset().await?;
    let board = service.live_board().await;
    Ok(Json(ApiResponse::success(ResetResponse {
        ledger: board.into(),
        persisted: outcome.persisted,
        warning: outcome.warning,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/venues/{venue}/quote",
    tag = "Venues",
    security(("bearer_auth" = [])),
    params(("venue" = String, Path, description = "Venue id"), QuoteParams),
    responses(
        (status = 200, description = "Price of a hypothetical session", body = ApiResponse<QuoteDto>),
        (status = 400, description = "Invalid parameters"),
        (status = 404, description = "Unknown venue or station")
    )
)]
pub async fn quote_session(
    State(state): State<VenueHandlerState>,
    Path(venue): Path<String>,
    Query(params): Query<QuoteParams>,
) -> ApiResult<QuoteDto> {
    params
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let service = state.registry.get(&venue)?;
    let players = params
        .players
        .map(PlayerCount::try_from)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let quote = service.quote(params.station, players, params.duration_ms)?;
    Ok(Json(ApiResponse::success(quote.into())))
}
