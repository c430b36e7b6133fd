//! Ledger persistence port

use async_trait::async_trait;

use super::model::Ledger;
use crate::shared::errors::StorageResult;

/// Durable store holding one ledger document per venue.
///
/// `write` must replace the stored document atomically: a reader never
/// observes a partially written ledger.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// `Ok(None)` when nothing has been stored for the venue yet.
    async fn read(&self, venue_id: &str) -> StorageResult<Option<Ledger>>;
    async fn write(&self, venue_id: &str, ledger: &Ledger) -> StorageResult<()>;
    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}
