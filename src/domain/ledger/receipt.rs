//! Session receipt and its printable ticket

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::venue::{PlayerCount, VenueConfig};
use crate::shared::time::{format_hms, VenueZone};

/// Produced exactly once per stop of a running session. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub station_id: u32,
    pub started_at: i64,
    pub ended_at: i64,
    pub duration_ms: i64,
    pub rate_per_minute: Decimal,
    #[serde(rename = "amountTND")]
    pub amount_tnd: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_count: Option<PlayerCount>,
    pub date_key: String,
}

impl Receipt {
    pub fn duration_hms(&self) -> String {
        format_hms(self.duration_ms)
    }

    /// Plain-text ticket for a receipt printer.
    pub fn render_ticket(&self, venue: &VenueConfig, zone: &VenueZone) -> String {
        let mut lines = vec![
            format!("{} Receipt", venue.name),
            format!("{} ({})", self.date_key, zone.name),
            "-".repeat(32),
            format!("{}: #{}", venue.station_label, self.station_id),
            format!("Start: {}", zone.format_date_time(self.started_at)),
            format!("End: {}", zone.format_date_time(self.ended_at)),
            format!("Duration: {}", self.duration_hms()),
        ];
        if let Some(players) = self.player_count {
            lines.push(format!("Players: {}", players));
        }
        lines.push(format!("Rate: {:.2} TND/min", self.rate_per_minute));
        lines.push("-".repeat(32));
        lines.push(format!("Total: {:.3} TND", self.amount_tnd));
        lines.push("Thank you!".to_string());
        lines.join("\n")
    }
}
