//! Venue aggregate
//!
//! Station pool size and rate table of one venue. Loaded once from
//! configuration and immutable for the process lifetime.

pub mod model;

pub use model::{rate_in_range, PlayerCount, RateRule, RateTable, VenueConfig, MAX_RATE_PER_MINUTE};
