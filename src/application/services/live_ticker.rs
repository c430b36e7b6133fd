//! Live ticker
//!
//! Periodically rebuilds the live board of one venue and publishes it on a
//! watch channel. Read-only: it never takes the writer lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::ledger_service::{LedgerService, LiveBoard};
use crate::shared::shutdown::ShutdownSignal;

pub const DEFAULT_TICK_MS: u64 = 1_000;

pub struct LiveTicker {
    service: Arc<LedgerService>,
    interval: Duration,
}

impl LiveTicker {
    pub fn new(service: Arc<LedgerService>) -> Self {
        Self {
            service,
            interval: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval = Duration::from_millis(interval_ms.max(1));
        self
    }

    /// Start ticking. The task ends on shutdown or once every receiver
    /// has been dropped.
    pub async fn spawn(self, shutdown: ShutdownSignal) -> (watch::Receiver<LiveBoard>, JoinHandle<()>) {
        let initial = self.service.live_board().await;
        let (tx, rx) = watch::channel(initial);
        let venue_id = self.service.venue().id.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(venue = %venue_id, interval_ms = self.interval.as_millis() as u64, "Live ticker started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let board = self.service.live_board().await;
                        if tx.send(board).is_err() {
                            debug!(venue = %venue_id, "Live ticker has no viewers left");
                            break;
                        }
                    }
                    _ = shutdown.wait() => {
                        info!(venue = %venue_id, "Live ticker shutting down");
                        break;
                    }
                }
            }
        });

        (rx, handle)
    }
}
