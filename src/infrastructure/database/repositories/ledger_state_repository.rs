//! SeaORM implementation of LedgerRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use tracing::debug;

use crate::domain::{Ledger, LedgerRepository};
use crate::infrastructure::database::entities::ledger_state;
use crate::shared::errors::StorageResult;

/// Ledger documents stored as rows of `ledger_states`. The upsert is a
/// single statement, so a row is always replaced whole.
pub struct SeaOrmLedgerRepository {
    db: DatabaseConnection,
}

impl SeaOrmLedgerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LedgerRepository for SeaOrmLedgerRepository {
    async fn read(&self, venue_id: &str) -> StorageResult<Option<Ledger>> {
        let row = ledger_state::Entity::find_by_id(venue_id.to_string())
            .one(&self.db)
            .await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.document)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, venue_id: &str, ledger: &Ledger) -> StorageResult<()> {
        let model = ledger_state::ActiveModel {
            venue_id: Set(venue_id.to_string()),
            date_key: Set(ledger.date_key.clone()),
            revenue: Set(ledger.revenue.to_string()),
            document: Set(serde_json::to_string(ledger)?),
            updated_at: Set(Utc::now()),
        };

        ledger_state::Entity::insert(model)
            .on_conflict(
                OnConflict::column(ledger_state::Column::VenueId)
                    .update_columns([
                        ledger_state::Column::DateKey,
                        ledger_state::Column::Revenue,
                        ledger_state::Column::Document,
                        ledger_state::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        debug!(venue = venue_id, "Ledger row upserted");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
