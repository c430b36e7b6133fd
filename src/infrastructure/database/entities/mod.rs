//! Database entities module

pub mod ledger_state;

pub use ledger_state::Entity as LedgerState;
