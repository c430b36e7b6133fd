//! Ledger service
//!
//! Owns the in-memory ledger of one venue and funnels every mutation
//! through a single writer. A mutation is applied in memory first, then
//! persisted by a background task that keeps holding the writer guard, so
//! a caller that goes away mid-write neither rolls back the change nor
//! lets a later write overtake it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use metrics::{counter, gauge};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};

use crate::application::events::{
    Event, LedgerRecoveredEvent, LedgerResetEvent, PersistenceDegradedEvent, SessionStartedEvent,
    SessionStoppedEvent, SharedEventBus,
};
use crate::domain::ledger::{round_money, session_cost};
use crate::domain::{
    DomainError, DomainResult, Ledger, LedgerRepository, PlayerCount, Receipt, Station,
    VenueConfig,
};
use crate::shared::errors::StorageError;
use crate::shared::retry::{retry_with_backoff, RetryConfig};
use crate::shared::time::{format_hms, SharedClock, VenueZone};

/// Result of a mutation that was applied in memory.
#[derive(Debug, Clone)]
pub struct MutationOutcome<T> {
    pub value: T,
    /// Ledger revenue once the mutation was committed
    pub revenue: Decimal,
    /// `false` when the durable copy is now behind the in-memory state
    pub persisted: bool,
    pub warning: Option<String>,
}

/// Cost preview for a hypothetical session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub station_id: u32,
    pub player_count: Option<PlayerCount>,
    pub rate_per_minute: Decimal,
    pub duration_ms: i64,
    pub amount: Decimal,
}

/// One station as displayed on the live board
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStation {
    #[serde(flatten)]
    pub station: Station,
    pub elapsed_ms: i64,
    pub elapsed: String,
    /// Running cost so far, rounded for display
    pub live_cost: Decimal,
    /// Session rate, or what a new default session would cost
    pub display_rate: Decimal,
}

/// Read-only view of a ledger at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveBoard {
    pub venue_id: String,
    pub date: String,
    pub revenue: Decimal,
    pub now_ms: i64,
    pub running: usize,
    pub persisted: bool,
    pub stations: Vec<LiveStation>,
}

impl LiveBoard {
    pub fn build(venue: &VenueConfig, ledger: &Ledger, now_ms: i64, persisted: bool) -> Self {
        let stations = ledger
            .stations
            .iter()
            .map(|station| {
                let elapsed_ms = station.live_elapsed_ms(now_ms);
                LiveStation {
                    station: station.clone(),
                    elapsed_ms,
                    elapsed: format_hms(elapsed_ms),
                    live_cost: round_money(station.live_cost(venue, now_ms)),
                    display_rate: station
                        .rate_per_minute
                        .unwrap_or_else(|| venue.default_rate_for(station.id)),
                }
            })
            .collect();

        Self {
            venue_id: venue.id.clone(),
            date: ledger.date_key.clone(),
            revenue: ledger.revenue,
            now_ms,
            running: ledger.running_count(),
            persisted,
            stations,
        }
    }
}

/// Per-venue knobs that are not part of the venue itself
#[derive(Debug, Clone, Default)]
pub struct LedgerOptions {
    pub zone: VenueZone,
    pub retry: RetryConfig,
}

/// Billing ledger of one venue
pub struct LedgerService {
    venue: Arc<VenueConfig>,
    zone: VenueZone,
    retry: RetryConfig,
    repo: Arc<dyn LedgerRepository>,
    clock: SharedClock,
    events: SharedEventBus,
    state: Arc<RwLock<Ledger>>,
    writer: Arc<Mutex<()>>,
    persisted: Arc<AtomicBool>,
}

impl LedgerService {
    /// Read the persisted ledger, falling back to a fresh one when it is
    /// missing, unreadable or structurally invalid. Never fails.
    pub async fn load(
        venue: VenueConfig,
        repo: Arc<dyn LedgerRepository>,
        clock: SharedClock,
        events: SharedEventBus,
        options: LedgerOptions,
    ) -> Self {
        let venue = Arc::new(venue);
        let recovery = match repo.read(&venue.id).await {
            Ok(Some(ledger)) => match ledger.validate(&venue, clock.now_ms()) {
                Ok(()) => Ok(ledger),
                Err(reason) => Err(format!("invalid persisted state: {}", reason)),
            },
            Ok(None) => Err("no persisted state".to_string()),
            Err(e) => Err(format!("unreadable persisted state: {}", e)),
        };

        let (ledger, recovered) = match recovery {
            Ok(ledger) => {
                info!(
                    venue = %venue.id,
                    backend = repo.backend_name(),
                    date = %ledger.date_key,
                    revenue = %ledger.revenue,
                    running = ledger.running_count(),
                    "Ledger loaded"
                );
                (ledger, None)
            }
            Err(reason) => {
                let ledger = Ledger::fresh(&venue, options.zone.date_key(clock.now_ms()));
                warn!(
                    venue = %venue.id,
                    backend = repo.backend_name(),
                    reason = %reason,
                    "Starting a fresh ledger"
                );
                (ledger, Some(reason))
            }
        };

        let service = Self {
            venue,
            zone: options.zone,
            retry: options.retry,
            repo,
            clock,
            events,
            state: Arc::new(RwLock::new(ledger.clone())),
            writer: Arc::new(Mutex::new(())),
            persisted: Arc::new(AtomicBool::new(true)),
        };

        if let Some(reason) = recovered {
            let guard = service.writer.clone().lock_owned().await;
            service.persist(guard, ledger.clone(), "recover").await;
            service.events.publish(Event::LedgerRecovered(LedgerRecoveredEvent {
                venue_id: service.venue.id.clone(),
                date_key: ledger.date_key.clone(),
                reason,
            }));
        }
        service.record_gauges(&ledger);
        service
    }

    pub fn venue(&self) -> &VenueConfig {
        &self.venue
    }

    pub fn zone(&self) -> &VenueZone {
        &self.zone
    }

    pub fn backend_name(&self) -> &'static str {
        self.repo.backend_name()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Whether the last write reached storage
    pub fn is_persisted(&self) -> bool {
        self.persisted.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Ledger {
        self.state.read().await.clone()
    }

    pub async fn live_board(&self) -> LiveBoard {
        let ledger = self.snapshot().await;
        LiveBoard::build(&self.venue, &ledger, self.clock.now_ms(), self.is_persisted())
    }

    /// Start a session. Rejected without change when the station is
    /// unknown or already running.
    pub async fn start(
        &self,
        station_id: u32,
        players: Option<PlayerCount>,
    ) -> DomainResult<MutationOutcome<Station>> {
        let venue = self.venue.clone();
        let outcome = self
            .mutate("start", move |ledger, now, _| {
                ledger.start(&venue, station_id, players, now)
            })
            .await?;

        let station = &outcome.value;
        let rate = station.rate_per_minute.unwrap_or_default();
        counter!("ledger_sessions_started_total", "venue" => self.venue.id.clone()).increment(1);
        info!(
            venue = %self.venue.id,
            station_id,
            players = ?station.player_count,
            rate = %rate,
            "Session started"
        );
        self.events.publish(Event::SessionStarted(SessionStartedEvent {
            venue_id: self.venue.id.clone(),
            station_id,
            started_at: station.start_time.unwrap_or_default(),
            player_count: station.player_count,
            rate_per_minute: rate,
        }));
        Ok(outcome)
    }

    /// Stop a station. Returns a receipt only when a session was running;
    /// stopping an idle station just clears its fields.
    pub async fn stop(&self, station_id: u32) -> DomainResult<MutationOutcome<Option<Receipt>>> {
        let venue = self.venue.clone();
        let outcome = self
            .mutate("stop", move |ledger, now, today| {
                ledger.stop(&venue, station_id, now, today)
            })
            .await?;

        let revenue = outcome.revenue;
        match &outcome.value {
            Some(receipt) => {
                counter!("ledger_sessions_stopped_total", "venue" => self.venue.id.clone())
                    .increment(1);
                info!(
                    venue = %self.venue.id,
                    station_id,
                    duration = %receipt.duration_hms(),
                    amount = %receipt.amount_tnd,
                    revenue = %revenue,
                    "Session stopped"
                );
                self.events.publish(Event::SessionStopped(SessionStoppedEvent {
                    venue_id: self.venue.id.clone(),
                    receipt: receipt.clone(),
                    revenue,
                }));
            }
            None => debug!(venue = %self.venue.id, station_id, "Stop on idle station"),
        }
        Ok(outcome)
    }

    /// Replace the ledger with a fresh one, dropping running sessions
    /// without receipts. Callers must obtain operator confirmation first.
    pub async fn reset(&self) -> DomainResult<MutationOutcome<Ledger>> {
        let venue = self.venue.clone();
        let outcome = self
            .mutate("reset", move |ledger, _, today| {
                let fresh = Ledger::fresh(&venue, today);
                let previous = std::mem::replace(ledger, fresh.clone());
                Ok((previous, fresh))
            })
            .await?;

        let (previous, current) = outcome.value;
        warn!(
            venue = %self.venue.id,
            previous_revenue = %previous.revenue,
            discarded_sessions = previous.running_count(),
            "Ledger reset"
        );
        self.events.publish(Event::LedgerReset(LedgerResetEvent {
            venue_id: self.venue.id.clone(),
            date_key: current.date_key.clone(),
            previous_revenue: previous.revenue,
            discarded_sessions: previous.running_count(),
        }));
        Ok(MutationOutcome {
            value: current,
            revenue: outcome.revenue,
            persisted: outcome.persisted,
            warning: outcome.warning,
        })
    }

    /// Price a session of `duration_ms` on a station without touching the
    /// ledger.
    pub fn quote(
        &self,
        station_id: u32,
        players: Option<PlayerCount>,
        duration_ms: i64,
    ) -> DomainResult<Quote> {
        if !self.venue.contains(station_id) {
            return Err(DomainError::InvalidStationId {
                venue_id: self.venue.id.clone(),
                station_id,
                station_count: self.venue.station_count,
            });
        }
        let player_count = self.venue.resolve_players(players);
        let rate = self.venue.rate_for(station_id, player_count);
        Ok(Quote {
            station_id,
            player_count,
            rate_per_minute: rate,
            duration_ms: duration_ms.max(0),
            amount: round_money(session_cost(duration_ms, rate)),
        })
    }

    /// Apply `f` under the writer lock and persist the result.
    ///
    /// `f` receives a scratch copy; on error nothing is committed.
    async fn mutate<T, F>(&self, operation: &'static str, f: F) -> DomainResult<MutationOutcome<T>>
    where
        F: FnOnce(&mut Ledger, i64, String) -> DomainResult<T>,
    {
        let guard = self.writer.clone().lock_owned().await;
        let now = self.clock.now_ms();
        let today = self.zone.date_key(now);

        let snapshot = {
            let mut ledger = self.state.write().await;
            let mut next = ledger.clone();
            let value = f(&mut next, now, today)?;
            *ledger = next.clone();
            (value, next)
        };
        let (value, committed) = snapshot;
        let revenue = committed.revenue;
        self.record_gauges(&committed);

        let persisted = self.persist(guard, committed, operation).await;
        let warning = (!persisted).then(|| {
            format!(
                "{} applied but not saved to {} storage",
                operation,
                self.repo.backend_name()
            )
        });
        Ok(MutationOutcome {
            value,
            revenue,
            persisted,
            warning,
        })
    }

    /// Write `ledger` from a detached task that owns the writer guard.
    async fn persist(&self, guard: OwnedMutexGuard<()>, ledger: Ledger, operation: &'static str) -> bool {
        let repo = self.repo.clone();
        let retry = self.retry.clone();
        let events = self.events.clone();
        let persisted = self.persisted.clone();
        let venue_id = self.venue.id.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let result = retry_with_backoff(
                &retry,
                || repo.write(&venue_id, &ledger),
                StorageError::is_transient,
                "ledger write",
            )
            .await;

            match result {
                Ok(()) => {
                    persisted.store(true, Ordering::SeqCst);
                    true
                }
                Err(e) => {
                    persisted.store(false, Ordering::SeqCst);
                    counter!("ledger_persist_failures_total", "venue" => venue_id.clone())
                        .increment(1);
                    error!(
                        venue = %venue_id,
                        operation,
                        backend = repo.backend_name(),
                        error = %e,
                        "Ledger write failed, persisted copy is stale"
                    );
                    events.publish(Event::PersistenceDegraded(PersistenceDegradedEvent {
                        venue_id,
                        operation: operation.to_string(),
                        message: e.to_string(),
                    }));
                    false
                }
            }
        });

        match handle.await {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(venue = %self.venue.id, operation, error = %e, "Ledger write task aborted");
                self.persisted.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    fn record_gauges(&self, ledger: &Ledger) {
        gauge!("ledger_revenue_tnd", "venue" => self.venue.id.clone())
            .set(ledger.revenue.to_f64().unwrap_or_default());
        gauge!("ledger_running_stations", "venue" => self.venue.id.clone())
            .set(ledger.running_count() as f64);
    }
}
