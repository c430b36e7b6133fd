//! Ledger domain entity
//!
//! The daily state of one venue: every station's running/stopped state
//! plus the accumulated revenue. Transitions here are pure; locking,
//! persistence and notifications live in the application layer.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::receipt::Receipt;
use crate::domain::venue::{rate_in_range, PlayerCount, VenueConfig, MAX_RATE_PER_MINUTE};
use crate::shared::errors::{DomainError, DomainResult};

const MS_PER_MINUTE: i64 = 60_000;

/// How far past the current clock a stored start time may lie
pub const START_TIME_SKEW_MS: i64 = 10 * MS_PER_MINUTE;

/// Decimal places kept for stored revenue and displayed amounts
pub const MONEY_SCALE: u32 = 3;

/// `minutes × rate`, minutes continuous (not floored). Negative elapsed
/// time counts as zero; the product saturates instead of overflowing.
pub fn session_cost(elapsed_ms: i64, rate_per_minute: Decimal) -> Decimal {
    Decimal::from(elapsed_ms.max(0)).saturating_mul(rate_per_minute) / Decimal::from(MS_PER_MINUTE)
}

/// Round half away from zero to [`MONEY_SCALE`] places.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A billable unit: billiard table or console station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: u32,
    pub running: bool,
    /// Session start, epoch milliseconds
    pub start_time: Option<i64>,
    #[serde(default)]
    pub player_count: Option<PlayerCount>,
    /// Rate frozen at session start
    #[serde(default)]
    pub rate_per_minute: Option<Decimal>,
}

/// Session fields taken off a station when it stops
#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveSession {
    started_at: i64,
    player_count: Option<PlayerCount>,
    rate_per_minute: Option<Decimal>,
}

impl Station {
    pub fn stopped(id: u32) -> Self {
        Self {
            id,
            running: false,
            start_time: None,
            player_count: None,
            rate_per_minute: None,
        }
    }

    /// `running` and `start_time` agree
    pub fn is_consistent(&self) -> bool {
        self.running == self.start_time.is_some()
    }

    pub fn live_elapsed_ms(&self, now_ms: i64) -> i64 {
        match (self.running, self.start_time) {
            (true, Some(start)) => now_ms.saturating_sub(start).max(0),
            _ => 0,
        }
    }

    /// Cost accrued so far, at the frozen session rate or the venue's
    /// display rate when none is on record.
    pub fn live_cost(&self, venue: &VenueConfig, now_ms: i64) -> Decimal {
        let rate = self
            .rate_per_minute
            .unwrap_or_else(|| venue.default_rate_for(self.id));
        session_cost(self.live_elapsed_ms(now_ms), rate)
    }

    fn take_session(&mut self) -> Option<ActiveSession> {
        let session = match (self.running, self.start_time) {
            (true, Some(started_at)) => Some(ActiveSession {
                started_at,
                player_count: self.player_count,
                rate_per_minute: self.rate_per_minute,
            }),
            _ => None,
        };
        *self = Station::stopped(self.id);
        session
    }
}

/// Daily state of one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    /// `YYYY-MM-DD` in the venue zone at creation/reset
    #[serde(rename = "date")]
    pub date_key: String,
    pub revenue: Decimal,
    pub stations: Vec<Station>,
}

impl Ledger {
    /// Zero revenue, every station stopped.
    pub fn fresh(venue: &VenueConfig, date_key: impl Into<String>) -> Self {
        Self {
            date_key: date_key.into(),
            revenue: Decimal::ZERO,
            stations: (1..=venue.station_count).map(Station::stopped).collect(),
        }
    }

    /// Structural check of a ledger read back from storage. Start times
    /// must lie in `0..=now_ms + START_TIME_SKEW_MS` and frozen rates within
    /// the venue rate cap.
    pub fn validate(&self, venue: &VenueConfig, now_ms: i64) -> Result<(), String> {
        if self.date_key.trim().is_empty() {
            return Err("empty date key".to_string());
        }
        if self.stations.len() != venue.station_count as usize {
            return Err(format!(
                "{} stations, expected {}",
                self.stations.len(),
                venue.station_count
            ));
        }
        for (idx, station) in self.stations.iter().enumerate() {
            let expected = idx as u32 + 1;
            if station.id != expected {
                return Err(format!(
                    "station at position {} has id {}, expected {}",
                    idx, station.id, expected
                ));
            }
            if !station.is_consistent() {
                return Err(format!(
                    "station {} has running={} but startTime={:?}",
                    station.id, station.running, station.start_time
                ));
            }
            if let Some(start) = station.start_time {
                if start < 0 {
                    return Err(format!("station {} has negative startTime {}", station.id, start));
                }
                if start > now_ms.saturating_add(START_TIME_SKEW_MS) {
                    return Err(format!(
                        "station {} startTime {} is ahead of the clock ({})",
                        station.id, start, now_ms
                    ));
                }
            }
            if let Some(rate) = station.rate_per_minute {
                if !rate_in_range(rate) {
                    return Err(format!(
                        "station {} rate {} is outside 0..={}",
                        station.id, rate, MAX_RATE_PER_MINUTE
                    ));
                }
            }
        }
        if self.revenue.is_sign_negative() {
            return Err(format!("negative revenue {}", self.revenue));
        }
        Ok(())
    }

    pub fn station(&self, station_id: u32) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == station_id)
    }

    fn station_mut(&mut self, venue: &VenueConfig, station_id: u32) -> DomainResult<&mut Station> {
        let invalid = || DomainError::InvalidStationId {
            venue_id: venue.id.clone(),
            station_id,
            station_count: venue.station_count,
        };
        if !venue.contains(station_id) {
            return Err(invalid());
        }
        self.stations
            .iter_mut()
            .find(|s| s.id == station_id)
            .ok_or_else(invalid)
    }

    pub fn running_count(&self) -> usize {
        self.stations.iter().filter(|s| s.running).count()
    }

    /// `Stopped -> Running`. The rate is resolved once here and frozen.
    pub fn start(
        &mut self,
        venue: &VenueConfig,
        station_id: u32,
        players: Option<PlayerCount>,
        now_ms: i64,
    ) -> DomainResult<Station> {
        let station = self.station_mut(venue, station_id)?;
        if station.running {
            return Err(DomainError::StationAlreadyRunning(station_id));
        }

        let players = venue.resolve_players(players);
        station.running = true;
        station.start_time = Some(now_ms);
        station.player_count = players;
        station.rate_per_minute = Some(venue.rate_for(station_id, players));
        Ok(station.clone())
    }

    /// `Running -> Stopped`, always clearing the session fields.
    ///
    /// Returns a receipt only when a session was actually running; stopping
    /// an idle station changes nothing but the (already clear) fields.
    pub fn stop(
        &mut self,
        venue: &VenueConfig,
        station_id: u32,
        now_ms: i64,
        date_key: impl Into<String>,
    ) -> DomainResult<Option<Receipt>> {
        let Some(session) = self.station_mut(venue, station_id)?.take_session() else {
            return Ok(None);
        };

        let rate = session
            .rate_per_minute
            .unwrap_or_else(|| venue.default_rate_for(station_id));
        let duration_ms = now_ms.saturating_sub(session.started_at).max(0);
        let cost = session_cost(duration_ms, rate);
        self.revenue = round_money(self.revenue.saturating_add(cost));

        Ok(Some(Receipt {
            station_id,
            started_at: session.started_at,
            ended_at: now_ms,
            duration_ms,
            rate_per_minute: rate,
            amount_tnd: round_money(cost),
            player_count: session.player_count,
            date_key: date_key.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_710_000_000_000;

    fn dec(num: i64, scale: u32) -> Decimal {
        Decimal::new(num, scale)
    }

    #[test]
    fn cost_is_continuous_minutes_times_rate() {
        assert_eq!(session_cost(600_000, dec(20, 2)), dec(2, 0));
        assert_eq!(session_cost(30_000, dec(25, 2)), dec(125, 3));
        assert_eq!(session_cost(1_000, dec(60, 2)), dec(1, 2));
        assert_eq!(session_cost(0, dec(25, 2)), Decimal::ZERO);
        assert_eq!(session_cost(-5_000, dec(25, 2)), Decimal::ZERO);
    }

    #[test]
    fn round_money_is_half_away_from_zero() {
        assert_eq!(round_money(dec(12345, 4)), dec(1235, 3));
        assert_eq!(round_money(dec(12344, 4)), dec(1234, 3));
        assert_eq!(round_money(dec(2, 0)), dec(2000, 3));
    }

    #[test]
    fn fresh_ledger_has_all_stations_stopped() {
        let venue = VenueConfig::game_room();
        let ledger = Ledger::fresh(&venue, "2024-03-10");
        assert_eq!(ledger.stations.len(), 7);
        assert_eq!(ledger.revenue, Decimal::ZERO);
        assert!(ledger
            .stations
            .iter()
            .enumerate()
            .all(|(i, s)| s.id == i as u32 + 1 && !s.running && s.is_consistent()));
        assert!(ledger.validate(&venue, NOW).is_ok());
    }

    #[test]
    fn start_freezes_rate_and_players() {
        let venue = VenueConfig::game_room();
        let mut ledger = Ledger::fresh(&venue, "2024-03-10");
        let st = ledger.start(&venue, 4, Some(PlayerCount::Four), 1_000).unwrap();
        assert!(st.running);
        assert_eq!(st.start_time, Some(1_000));
        assert_eq!(st.player_count, Some(PlayerCount::Four));
        assert_eq!(st.rate_per_minute, Some(dec(25, 2)));
        assert_eq!(ledger.station(4), Some(&st));
    }

    #[test]
    fn start_on_running_station_is_rejected_without_change() {
        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 1, None, 1_000).unwrap();
        let before = ledger.clone();
        let err = ledger.start(&venue, 1, None, 9_000).unwrap_err();
        assert!(matches!(err, DomainError::StationAlreadyRunning(1)));
        assert_eq!(ledger, before);
    }

    #[test]
    fn unknown_station_is_rejected() {
        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "d");
        let before = ledger.clone();
        for bad in [0, 5] {
            assert!(matches!(
                ledger.start(&venue, bad, None, 0),
                Err(DomainError::InvalidStationId { station_id, .. }) if station_id == bad
            ));
            assert!(ledger.stop(&venue, bad, 0, "d").is_err());
        }
        assert_eq!(ledger, before);
    }

    #[test]
    fn stop_bills_and_clears_session() {
        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 1, None, 0).unwrap();
        let receipt = ledger.stop(&venue, 1, 600_000, "2024-03-10").unwrap().unwrap();

        assert_eq!(receipt.amount_tnd, dec(2, 0));
        assert_eq!(receipt.duration_ms, 600_000);
        assert_eq!(receipt.rate_per_minute, dec(20, 2));
        assert_eq!(receipt.date_key, "2024-03-10");
        assert_eq!(ledger.revenue, dec(2, 0));
        assert_eq!(ledger.station(1), Some(&Station::stopped(1)));
    }

    #[test]
    fn stop_with_clock_moved_backwards_bills_zero() {
        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 2, None, 10_000).unwrap();
        let receipt = ledger.stop(&venue, 2, 4_000, "d").unwrap().unwrap();
        assert_eq!(receipt.duration_ms, 0);
        assert_eq!(receipt.amount_tnd, Decimal::ZERO);
        assert_eq!(ledger.revenue, Decimal::ZERO);
    }

    #[test]
    fn stop_on_idle_station_returns_no_receipt() {
        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.revenue = dec(5, 0);
        assert!(ledger.stop(&venue, 3, 1_000, "d").unwrap().is_none());
        assert_eq!(ledger.revenue, dec(5, 0));
    }

    #[test]
    fn stop_without_recorded_rate_uses_display_rate() {
        let venue = VenueConfig::game_room();
        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.stations[4] = Station {
            id: 5,
            running: true,
            start_time: Some(0),
            player_count: None,
            rate_per_minute: None,
        };
        let receipt = ledger.stop(&venue, 5, 60_000, "d").unwrap().unwrap();
        assert_eq!(receipt.rate_per_minute, dec(15, 2));
        assert_eq!(receipt.amount_tnd, dec(15, 2));
    }

    #[test]
    fn revenue_is_stored_rounded_to_three_places() {
        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "d");
        // 0.21 TND/min for 1234 ms = 0.004319 TND
        ledger.start(&venue, 3, None, 0).unwrap();
        let receipt = ledger.stop(&venue, 3, 1_234, "d").unwrap().unwrap();
        assert_eq!(receipt.amount_tnd, dec(4, 3));
        assert_eq!(ledger.revenue, dec(4, 3));
    }

    #[test]
    fn live_elapsed_and_cost_are_pure() {
        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 4, None, 1_000).unwrap();
        let station = ledger.station(4).unwrap().clone();

        assert_eq!(station.live_elapsed_ms(61_000), 60_000);
        assert_eq!(station.live_cost(&venue, 61_000), dec(25, 2));
        assert_eq!(station.live_elapsed_ms(500), 0);
        assert_eq!(ledger.station(4), Some(&station));

        let idle = ledger.station(1).unwrap();
        assert_eq!(idle.live_elapsed_ms(999_999), 0);
        assert_eq!(idle.live_cost(&venue, 999_999), Decimal::ZERO);
    }

    #[test]
    fn validate_rejects_wrong_station_count() {
        let venue = VenueConfig::game_room();
        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.stations.pop();
        assert_eq!(ledger.validate(&venue, NOW).unwrap_err(), "6 stations, expected 7");
    }

    #[test]
    fn validate_rejects_broken_invariants() {
        let venue = VenueConfig::billiard();

        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.stations[0].running = true;
        assert!(ledger.validate(&venue, NOW).is_err());

        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.stations[1].id = 7;
        assert!(ledger.validate(&venue, NOW).is_err());

        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.revenue = dec(-1, 0);
        assert!(ledger.validate(&venue, NOW).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_start_times() {
        let venue = VenueConfig::billiard();

        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 1, None, i64::MIN).unwrap();
        assert!(ledger.validate(&venue, NOW).unwrap_err().contains("negative startTime"));

        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 1, None, NOW + START_TIME_SKEW_MS + 1).unwrap();
        assert!(ledger.validate(&venue, NOW).unwrap_err().contains("ahead of the clock"));

        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 1, None, NOW + START_TIME_SKEW_MS).unwrap();
        assert!(ledger.validate(&venue, NOW).is_ok());
    }

    #[test]
    fn validate_rejects_rates_beyond_cap() {
        let venue = VenueConfig::billiard();

        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 2, None, NOW).unwrap();
        ledger.stations[1].rate_per_minute = Some(Decimal::from(10_000_000_000_000_000_000u64));
        assert!(ledger.validate(&venue, NOW).unwrap_err().contains("outside"));

        ledger.stations[1].rate_per_minute = Some(dec(-1, 2));
        assert!(ledger.validate(&venue, NOW).is_err());

        ledger.stations[1].rate_per_minute = Some(MAX_RATE_PER_MINUTE);
        assert!(ledger.validate(&venue, NOW).is_ok());
    }

    #[test]
    fn extreme_values_saturate_instead_of_overflowing() {
        assert_eq!(
            session_cost(i64::MAX, Decimal::MAX),
            Decimal::MAX / Decimal::from(MS_PER_MINUTE)
        );

        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "d");
        ledger.start(&venue, 1, None, i64::MIN).unwrap();
        assert_eq!(ledger.station(1).unwrap().live_elapsed_ms(NOW), i64::MAX);

        ledger.revenue = Decimal::MAX;
        let receipt = ledger.stop(&venue, 1, NOW, "d").unwrap().unwrap();
        assert_eq!(receipt.duration_ms, i64::MAX);
        assert!(!ledger.station(1).unwrap().running);
        assert!(ledger.revenue > Decimal::ZERO);
    }

    #[test]
    fn json_shape_uses_dashboard_field_names() {
        let venue = VenueConfig::game_room();
        let mut ledger = Ledger::fresh(&venue, "2024-03-10");
        ledger.start(&venue, 1, Some(PlayerCount::Four), 1_700_000_000_000).unwrap();

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["date"], "2024-03-10");
        assert_eq!(json["stations"][0]["startTime"], 1_700_000_000_000i64);
        assert_eq!(json["stations"][0]["playerCount"], 4);
        assert_eq!(json["stations"][0]["ratePerMinute"], 0.2);
        assert!(json["stations"][1]["startTime"].is_null());
    }

    #[test]
    fn reads_legacy_file_without_optional_fields() {
        let raw = r#"{
            "date": "2024-03-10",
            "revenue": 12.345,
            "stations": [
                { "id": 1, "running": true, "startTime": 1000 },
                { "id": 2, "running": false, "startTime": null },
                { "id": 3, "running": false, "startTime": null },
                { "id": 4, "running": false, "startTime": null }
            ]
        }"#;
        let ledger: Ledger = serde_json::from_str(raw).unwrap();
        assert_eq!(ledger.revenue, dec(12345, 3));
        assert_eq!(ledger.stations[0].rate_per_minute, None);
        assert!(ledger.validate(&VenueConfig::billiard(), NOW).is_ok());
    }
}
