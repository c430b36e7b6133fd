//! Ledger events
//!
//! Everything broadcast to WebSocket clients and CLI watchers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{PlayerCount, Receipt};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A station went Stopped -> Running
    SessionStarted(SessionStartedEvent),
    /// A running session was stopped and billed
    SessionStopped(SessionStoppedEvent),
    /// Ledger replaced with a fresh default on operator request
    LedgerReset(LedgerResetEvent),
    /// Persisted state was missing or invalid and a fresh ledger was created
    LedgerRecovered(LedgerRecoveredEvent),
    /// In-memory state is ahead of the persisted copy
    PersistenceDegraded(PersistenceDegradedEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::SessionStarted(_) => "session_started",
            Event::SessionStopped(_) => "session_stopped",
            Event::LedgerReset(_) => "ledger_reset",
            Event::LedgerRecovered(_) => "ledger_recovered",
            Event::PersistenceDegraded(_) => "persistence_degraded",
        }
    }

    pub fn venue_id(&self) -> &str {
        match self {
            Event::SessionStarted(e) => &e.venue_id,
            Event::SessionStopped(e) => &e.venue_id,
            Event::LedgerReset(e) => &e.venue_id,
            Event::LedgerRecovered(e) => &e.venue_id,
            Event::PersistenceDegraded(e) => &e.venue_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartedEvent {
    pub venue_id: String,
    pub station_id: u32,
    pub started_at: i64,
    pub player_count: Option<PlayerCount>,
    pub rate_per_minute: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStoppedEvent {
    pub venue_id: String,
    pub receipt: Receipt,
    /// Ledger revenue after this session was added
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResetEvent {
    pub venue_id: String,
    pub date_key: String,
    /// Revenue discarded by the reset
    pub previous_revenue: Decimal,
    /// Sessions that were running and dropped without a receipt
    pub discarded_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecoveredEvent {
    pub venue_id: String,
    pub date_key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceDegradedEvent {
    pub venue_id: String,
    pub operation: String,
    pub message: String,
}

/// Event with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
