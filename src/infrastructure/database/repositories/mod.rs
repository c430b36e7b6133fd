mod ledger_state_repository;

pub use ledger_state_repository::SeaOrmLedgerRepository;
