//! Ledger document entity: one row per venue

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_states")]
pub struct Model {
    /// Venue identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub venue_id: String,

    /// Ledger date key, duplicated out of the document for queries
    pub date_key: String,

    /// Revenue as a decimal string, duplicated out of the document
    pub revenue: String,

    /// Full ledger as JSON, same shape as the file backend
    #[sea_orm(column_type = "Text")]
    pub document: String,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
