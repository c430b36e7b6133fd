//! Venue ledgers: board, start/stop, reset, quote

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
