pub mod ledger;
pub mod venue;

pub use ledger::{Ledger, LedgerRepository, Receipt, Station};
pub use venue::{PlayerCount, RateRule, RateTable, VenueConfig};

pub use crate::shared::errors::{DomainError, DomainResult};
