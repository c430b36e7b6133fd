//! Ledger aggregate
//!
//! Daily station state and revenue of one venue, the receipt emitted when
//! a session stops, and the persistence port.

pub mod model;
pub mod receipt;
pub mod repository;

pub use model::{round_money, session_cost, Ledger, Station, MONEY_SCALE};
pub use receipt::Receipt;
pub use repository::LedgerRepository;
