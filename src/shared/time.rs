//! Wall clock and venue time zone

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Source of "now" as epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Used by tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Named venue time zone with a fixed UTC offset.
///
/// Africa/Tunis has had no daylight saving since 2009, so a fixed offset
/// reproduces it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueZone {
    pub name: String,
    pub utc_offset_minutes: i32,
}

impl Default for VenueZone {
    fn default() -> Self {
        Self {
            name: "Africa/Tunis".to_string(),
            utc_offset_minutes: 60,
        }
    }
}

impl VenueZone {
    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    fn local(&self, epoch_ms: i64) -> DateTime<FixedOffset> {
        let utc = Utc
            .timestamp_millis_opt(epoch_ms)
            .single()
            .unwrap_or_default();
        utc.with_timezone(&self.offset())
    }

    /// Ledger date key, `YYYY-MM-DD` in this zone.
    pub fn date_key(&self, epoch_ms: i64) -> String {
        self.local(epoch_ms).format("%Y-%m-%d").to_string()
    }

    /// Receipt timestamp, `DD/MM/YYYY, HH:MM:SS` in this zone.
    pub fn format_date_time(&self, epoch_ms: i64) -> String {
        self.local(epoch_ms).format("%d/%m/%Y, %H:%M:%S").to_string()
    }
}

/// `HH:MM:SS` for a duration in milliseconds. Negative input renders as zero,
/// hours are not wrapped at 24.
pub fn format_hms(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}
