//! Ledger repository implementations

mod file;
mod memory;

pub use file::FileLedgerRepository;
pub use memory::MemoryLedgerRepository;
