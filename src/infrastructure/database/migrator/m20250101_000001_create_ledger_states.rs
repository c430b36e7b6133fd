//! Create ledger_states table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LedgerStates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerStates::VenueId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerStates::DateKey).string().not_null())
                    .col(
                        ColumnDef::new(LedgerStates::Revenue)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(LedgerStates::Document).text().not_null())
                    .col(
                        ColumnDef::new(LedgerStates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerStates::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum LedgerStates {
    Table,
    VenueId,
    DateKey,
    Revenue,
    Document,
    UpdatedAt,
}
