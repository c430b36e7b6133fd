//! Infrastructure layer - external concerns

pub mod crypto;
pub mod database;
pub mod storage;

pub use database::{connect_and_migrate, init_database, DatabaseConfig, SeaOrmLedgerRepository};
pub use storage::{FileLedgerRepository, MemoryLedgerRepository};
