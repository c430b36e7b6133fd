//! Venue configuration: station pool and rate table

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of players at a game room station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlayerCount {
    Two,
    Four,
}

impl PlayerCount {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Two => 2,
            Self::Four => 4,
        }
    }
}

impl TryFrom<u8> for PlayerCount {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            other => Err(format!("player count must be 2 or 4, got {}", other)),
        }
    }
}

impl From<PlayerCount> for u8 {
    fn from(p: PlayerCount) -> Self {
        p.as_u8()
    }
}

impl std::fmt::Display for PlayerCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Highest accepted price per minute, TND
pub const MAX_RATE_PER_MINUTE: Decimal = Decimal::ONE_THOUSAND;

/// `0 <= rate <= MAX_RATE_PER_MINUTE`
pub fn rate_in_range(rate: Decimal) -> bool {
    !rate.is_sign_negative() && rate <= MAX_RATE_PER_MINUTE
}

/// One row of a rate table.
///
/// An empty `stations` list matches every station; a missing `players`
/// matches any player count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRule {
    #[serde(default)]
    pub stations: Vec<u32>,
    #[serde(default)]
    pub players: Option<PlayerCount>,
    /// Price per minute, TND
    pub rate: Decimal,
}

impl RateRule {
    fn matches(&self, station_id: u32, players: Option<PlayerCount>) -> bool {
        let station_ok = self.stations.is_empty() || self.stations.contains(&station_id);
        let players_ok = match self.players {
            None => true,
            Some(p) => players == Some(p),
        };
        station_ok && players_ok
    }
}

/// Static per-minute price list. First matching rule wins, otherwise
/// `default_rate` applies, so lookups are total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub default_rate: Decimal,
    #[serde(default)]
    pub rules: Vec<RateRule>,
}

impl RateTable {
    pub fn flat(rate: Decimal) -> Self {
        Self {
            default_rate: rate,
            rules: Vec::new(),
        }
    }

    pub fn rate_for(&self, station_id: u32, players: Option<PlayerCount>) -> Decimal {
        self.rules
            .iter()
            .find(|r| r.matches(station_id, players))
            .map(|r| r.rate)
            .unwrap_or(self.default_rate)
    }
}

/// A venue: fixed pool of stations `1..=station_count` and its prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueConfig {
    /// URL-safe identifier, also the persistence key
    pub id: String,
    pub name: String,
    /// What one station is called on receipts ("Table", "Station")
    #[serde(default = "default_station_label")]
    pub station_label: String,
    pub station_count: u32,
    /// Whether sessions are priced by player count
    #[serde(default)]
    pub tracks_players: bool,
    #[serde(default = "default_player_count")]
    pub default_player_count: PlayerCount,
    pub rates: RateTable,
}

fn default_station_label() -> String {
    "Station".to_string()
}

fn default_player_count() -> PlayerCount {
    PlayerCount::Two
}

impl VenueConfig {
    /// Four billiard tables: #1-2 at 0.20, #3 at 0.21, #4 at 0.25 TND/min.
    pub fn billiard() -> Self {
        Self {
            id: "billiard".to_string(),
            name: "Billiard".to_string(),
            station_label: "Table".to_string(),
            station_count: 4,
            tracks_players: false,
            default_player_count: PlayerCount::Two,
            rates: RateTable {
                default_rate: Decimal::new(20, 2),
                rules: vec![
                    RateRule {
                        stations: vec![1, 2],
                        players: None,
                        rate: Decimal::new(20, 2),
                    },
                    RateRule {
                        stations: vec![3],
                        players: None,
                        rate: Decimal::new(21, 2),
                    },
                    RateRule {
                        stations: vec![4],
                        players: None,
                        rate: Decimal::new(25, 2),
                    },
                ],
            },
        }
    }

    /// Seven console stations priced by group and player count.
    /// Group A (1, 2, 3, 7): 0.12 for 2 players, 0.20 for 4.
    /// Others: 0.15 for 2 players, 0.25 for 4.
    pub fn game_room() -> Self {
        let group_a = vec![1, 2, 3, 7];
        Self {
            id: "game-room".to_string(),
            name: "Game Room".to_string(),
            station_label: "Station".to_string(),
            station_count: 7,
            tracks_players: true,
            default_player_count: PlayerCount::Two,
            rates: RateTable {
                default_rate: Decimal::new(15, 2),
                rules: vec![
                    RateRule {
                        stations: group_a.clone(),
                        players: Some(PlayerCount::Two),
                        rate: Decimal::new(12, 2),
                    },
                    RateRule {
                        stations: group_a,
                        players: Some(PlayerCount::Four),
                        rate: Decimal::new(20, 2),
                    },
                    RateRule {
                        stations: Vec::new(),
                        players: Some(PlayerCount::Two),
                        rate: Decimal::new(15, 2),
                    },
                    RateRule {
                        stations: Vec::new(),
                        players: Some(PlayerCount::Four),
                        rate: Decimal::new(25, 2),
                    },
                ],
            },
        }
    }

    pub fn contains(&self, station_id: u32) -> bool {
        (1..=self.station_count).contains(&station_id)
    }

    /// Player count to record for a new session. Venues that do not price
    /// by players never record one.
    pub fn resolve_players(&self, requested: Option<PlayerCount>) -> Option<PlayerCount> {
        if self.tracks_players {
            Some(requested.unwrap_or(self.default_player_count))
        } else {
            None
        }
    }

    /// Rate frozen into a session started with `players`.
    pub fn rate_for(&self, station_id: u32, players: Option<PlayerCount>) -> Decimal {
        self.rates
            .rate_for(station_id, self.resolve_players(players))
    }

    /// Rate shown for a station with no session rate on record.
    pub fn default_rate_for(&self, station_id: u32) -> Decimal {
        self.rate_for(station_id, None)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty()
            || !self
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!(
                "venue id '{}' must be non-empty and contain only [A-Za-z0-9_-]",
                self.id
            ));
        }
        if self.station_count == 0 {
            return Err(format!("venue {} must have at least one station", self.id));
        }
        if !rate_in_range(self.rates.default_rate) {
            return Err(format!(
                "venue {} default rate {} is outside 0..={}",
                self.id, self.rates.default_rate, MAX_RATE_PER_MINUTE
            ));
        }
        for rule in &self.rates.rules {
            if !rate_in_range(rule.rate) {
                return Err(format!(
                    "venue {} rate {} is outside 0..={}",
                    self.id, rule.rate, MAX_RATE_PER_MINUTE
                ));
            }
            if let Some(bad) = rule.stations.iter().find(|id| !self.contains(**id)) {
                return Err(format!(
                    "venue {} rate rule references station {} outside 1..={}",
                    self.id, bad, self.station_count
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billiard_rates_match_price_list() {
        let v = VenueConfig::billiard();
        assert_eq!(v.rate_for(1, None), Decimal::new(20, 2));
        assert_eq!(v.rate_for(2, None), Decimal::new(20, 2));
        assert_eq!(v.rate_for(3, None), Decimal::new(21, 2));
        assert_eq!(v.rate_for(4, None), Decimal::new(25, 2));
    }

    #[test]
    fn billiard_ignores_player_count() {
        let v = VenueConfig::billiard();
        assert_eq!(v.resolve_players(Some(PlayerCount::Four)), None);
        assert_eq!(v.rate_for(4, Some(PlayerCount::Four)), Decimal::new(25, 2));
    }

    #[test]
    fn game_room_rates_by_group_and_players() {
        let v = VenueConfig::game_room();
        for id in [1, 2, 3, 7] {
            assert_eq!(v.rate_for(id, Some(PlayerCount::Two)), Decimal::new(12, 2));
            assert_eq!(v.rate_for(id, Some(PlayerCount::Four)), Decimal::new(20, 2));
        }
        for id in [4, 5, 6] {
            assert_eq!(v.rate_for(id, Some(PlayerCount::Two)), Decimal::new(15, 2));
            assert_eq!(v.rate_for(id, Some(PlayerCount::Four)), Decimal::new(25, 2));
        }
    }

    #[test]
    fn game_room_defaults_to_two_players() {
        let v = VenueConfig::game_room();
        assert_eq!(v.resolve_players(None), Some(PlayerCount::Two));
        assert_eq!(v.default_rate_for(5), Decimal::new(15, 2));
    }

    #[test]
    fn unknown_station_falls_back_to_default_rate() {
        let v = VenueConfig::billiard();
        assert_eq!(v.rates.rate_for(42, None), v.rates.default_rate);
    }

    #[test]
    fn player_count_serializes_as_number() {
        assert_eq!(serde_json::to_string(&PlayerCount::Four).unwrap(), "4");
        let p: PlayerCount = serde_json::from_str("2").unwrap();
        assert_eq!(p, PlayerCount::Two);
        assert!(serde_json::from_str::<PlayerCount>("3").is_err());
    }

    #[test]
    fn presets_are_valid() {
        assert!(VenueConfig::billiard().validate().is_ok());
        assert!(VenueConfig::game_room().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_rule() {
        let mut v = VenueConfig::billiard();
        v.rates.rules.push(RateRule {
            stations: vec![5],
            players: None,
            rate: Decimal::ONE,
        });
        let err = v.validate().unwrap_err();
        assert!(err.contains("station 5"));
    }

    #[test]
    fn validate_rejects_rates_beyond_cap() {
        let mut v = VenueConfig::game_room();
        v.rates.rules[0].rate = MAX_RATE_PER_MINUTE + Decimal::ONE;
        assert!(v.validate().unwrap_err().contains("outside"));

        let mut v = VenueConfig::billiard();
        v.rates.default_rate = Decimal::new(-1, 2);
        assert!(v.validate().is_err());

        let mut v = VenueConfig::billiard();
        v.rates.default_rate = MAX_RATE_PER_MINUTE;
        assert!(v.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_id_and_empty_pool() {
        let mut v = VenueConfig::billiard();
        v.id = "bil liard".into();
        assert!(v.validate().is_err());

        let mut v = VenueConfig::billiard();
        v.station_count = 0;
        assert!(v.validate().is_err());
    }
}
