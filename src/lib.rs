//! # Venue Ledger
//!
//! Session billing for a billiard hall and a game room: per-station
//! timers, rate tables, receipts and a daily revenue ledger that survives
//! restarts.
//!
//! ## Architecture
//!
//! - **domain**: ledger, stations, receipts, venue rate tables
//! - **application**: ledger service, live ticker, event bus
//! - **infrastructure**: file / SQLite / memory storage, JWT and bcrypt
//! - **interfaces**: REST API with Swagger docs, WebSocket notifications
//! - **shared**: errors, clock and venue time zone, retry, shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, resolve_config_path, AppConfig};

pub use application::{create_event_bus, Event, EventBus, LedgerService, SharedEventBus};
pub use domain::{Ledger, Receipt, Station, VenueConfig};
pub use interfaces::http::create_api_router;
pub use server::{init_tracing, ServerHandle, ServerOptions};
