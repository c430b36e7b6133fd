//! In-memory ledger repository

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{Ledger, LedgerRepository};
use crate::shared::errors::StorageResult;

/// Ledgers kept in process memory only. Used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryLedgerRepository {
    ledgers: DashMap<String, Ledger>,
}

impl MemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedgerRepository {
    async fn read(&self, venue_id: &str) -> StorageResult<Option<Ledger>> {
        Ok(self.ledgers.get(venue_id).map(|entry| entry.value().clone()))
    }

    async fn write(&self, venue_id: &str, ledger: &Ledger) -> StorageResult<()> {
        self.ledgers.insert(venue_id.to_string(), ledger.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
