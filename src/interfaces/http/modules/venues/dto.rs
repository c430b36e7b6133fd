//! Venue and ledger DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::services::{LiveBoard, LiveStation, Quote};
use crate::domain::{PlayerCount, RateRule, Receipt, Station, VenueConfig};
use crate::interfaces::http::common::ApiError;
use crate::shared::time::format_hms;

/// Rate table row
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RateRuleDto {
    /// Stations the rule applies to; empty means all
    pub stations: Vec<u32>,
    /// Player count the rule applies to; absent means any
    pub players: Option<u8>,
    /// TND per minute
    pub rate: Decimal,
}

impl From<&RateRule> for RateRuleDto {
    fn from(r: &RateRule) -> Self {
        Self {
            stations: r.stations.clone(),
            players: r.players.map(PlayerCount::as_u8),
            rate: r.rate,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VenueDto {
    pub id: String,
    pub name: String,
    pub station_label: String,
    pub station_count: u32,
    pub tracks_players: bool,
    pub default_player_count: Option<u8>,
    pub default_rate: Decimal,
    pub rules: Vec<RateRuleDto>,
}

impl From<&VenueConfig> for VenueDto {
    fn from(v: &VenueConfig) -> Self {
        Self {
            id: v.id.clone(),
            name: v.name.clone(),
            station_label: v.station_label.clone(),
            station_count: v.station_count,
            tracks_players: v.tracks_players,
            default_player_count: v.tracks_players.then(|| v.default_player_count.as_u8()),
            default_rate: v.rates.default_rate,
            rules: v.rates.rules.iter().map(RateRuleDto::from).collect(),
        }
    }
}

/// A station with its live timer and running cost
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StationDto {
    pub id: u32,
    pub running: bool,
    /// Session start, epoch milliseconds
    pub start_time: Option<i64>,
    pub player_count: Option<u8>,
    /// Rate frozen at session start
    pub rate_per_minute: Option<Decimal>,
    pub elapsed_ms: i64,
    /// `HH:MM:SS`
    pub elapsed: String,
    pub live_cost: Decimal,
    pub display_rate: Decimal,
}

impl From<LiveStation> for StationDto {
    fn from(s: LiveStation) -> Self {
        Self {
            id: s.station.id,
            running: s.station.running,
            start_time: s.station.start_time,
            player_count: s.station.player_count.map(PlayerCount::as_u8),
            rate_per_minute: s.station.rate_per_minute,
            elapsed_ms: s.elapsed_ms,
            elapsed: s.elapsed,
            live_cost: s.live_cost,
            display_rate: s.display_rate,
        }
    }
}

impl From<&Station> for StationDto {
    /// A station at the instant its session started
    fn from(s: &Station) -> Self {
        Self {
            id: s.id,
            running: s.running,
            start_time: s.start_time,
            player_count: s.player_count.map(PlayerCount::as_u8),
            rate_per_minute: s.rate_per_minute,
            elapsed_ms: 0,
            elapsed: format_hms(0),
            live_cost: Decimal::ZERO,
            display_rate: s.rate_per_minute.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LedgerDto {
    pub venue_id: String,
    /// Ledger day, `YYYY-MM-DD` in the venue zone
    pub date: String,
    pub revenue: Decimal,
    pub now_ms: i64,
    pub running: usize,
    /// `false` when the stored copy is behind this state
    pub persisted: bool,
    pub stations: Vec<StationDto>,
}

impl From<LiveBoard> for LedgerDto {
    fn from(b: LiveBoard) -> Self {
        Self {
            venue_id: b.venue_id,
            date: b.date,
            revenue: b.revenue,
            now_ms: b.now_ms,
            running: b.running,
            persisted: b.persisted,
            stations: b.stations.into_iter().map(StationDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiptDto {
    pub station_id: u32,
    pub started_at: i64,
    pub ended_at: i64,
    pub duration_ms: i64,
    pub duration: String,
    pub rate_per_minute: Decimal,
    pub amount_tnd: Decimal,
    pub player_count: Option<u8>,
    pub date_key: String,
}

impl From<&Receipt> for ReceiptDto {
    fn from(r: &Receipt) -> Self {
        Self {
            station_id: r.station_id,
            started_at: r.started_at,
            ended_at: r.ended_at,
            duration_ms: r.duration_ms,
            duration: r.duration_hms(),
            rate_per_minute: r.rate_per_minute,
            amount_tnd: r.amount_tnd,
            player_count: r.player_count.map(PlayerCount::as_u8),
            date_key: r.date_key.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct StartSessionRequest {
    /// 2 or 4; ignored by venues that do not price by players
    #[validate(range(min = 2, max = 4, message = "player_count must be 2 or 4"))]
    pub player_count: Option<u8>,
}

impl StartSessionRequest {
    pub fn players(&self) -> Result<Option<PlayerCount>, ApiError> {
        self.player_count
            .map(PlayerCount::try_from)
            .transpose()
            .map_err(ApiError::bad_request)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartSessionResponse {
    pub station: StationDto,
    pub persisted: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StopSessionResponse {
    /// Absent when the station was not running
    pub receipt: Option<ReceiptDto>,
    /// Printable ticket for the receipt
    pub ticket: Option<String>,
    pub revenue: Decimal,
    pub persisted: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetRequest {
    /// Must be `true`
    pub confirm: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetResponse {
    pub ledger: LedgerDto,
    pub persisted: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuoteParams {
    pub station: u32,
    #[validate(range(min = 2, max = 4, message = "players must be 2 or 4"))]
    pub players: Option<u8>,
    #[validate(range(min = 0, message = "duration_ms must not be negative"))]
    pub duration_ms: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteDto {
    pub station_id: u32,
    pub player_count: Option<u8>,
    pub rate_per_minute: Decimal,
    pub duration_ms: i64,
    pub amount: Decimal,
}

impl From<Quote> for QuoteDto {
    fn from(q: Quote) -> Self {
        Self {
            station_id: q.station_id,
            player_count: q.player_count.map(PlayerCount::as_u8),
            rate_per_minute: q.rate_per_minute,
            duration_ms: q.duration_ms,
            amount: q.amount,
        }
    }
}
