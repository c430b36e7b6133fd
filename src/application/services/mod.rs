//! Application services

mod ledger_service;
mod live_ticker;
mod registry;

pub use ledger_service::{
    LedgerOptions, LedgerService, LiveBoard, LiveStation, MutationOutcome, Quote,
};
pub use live_ticker::{LiveTicker, DEFAULT_TICK_MS};
pub use registry::{SharedVenueRegistry, VenueRegistry};
