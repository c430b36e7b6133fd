//! Venue registry: one ledger service per configured venue

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ledger_service::LedgerService;
use crate::shared::errors::{DomainError, DomainResult};

#[derive(Default)]
pub struct VenueRegistry {
    ledgers: BTreeMap<String, Arc<LedgerService>>,
}

pub type SharedVenueRegistry = Arc<VenueRegistry>;

impl VenueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, service: LedgerService) -> Arc<LedgerService> {
        let service = Arc::new(service);
        self.ledgers
            .insert(service.venue().id.clone(), service.clone());
        service
    }

    pub fn get(&self, venue_id: &str) -> DomainResult<Arc<LedgerService>> {
        self.ledgers
            .get(venue_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound {
                entity: "Venue",
                field: "id",
                value: venue_id.to_string(),
            })
    }

    /// Services ordered by venue id
    pub fn all(&self) -> impl Iterator<Item = &Arc<LedgerService>> {
        self.ledgers.values()
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }
}
