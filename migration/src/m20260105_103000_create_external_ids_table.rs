use crate::m20260105_101500_create_books_table::Books;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BookExternalIds::Table)
                    .if_not_exists()
                    .col(string(BookExternalIds::Id).primary_key())
                    .col(uuid(BookExternalIds::BookId))
                    .col(string(BookExternalIds::Source))
                    .col(string(BookExternalIds::ExternalId))
                    .col(string_null(BookExternalIds::ProviderIsbn10).unique_key())
                    .col(string_null(BookExternalIds::ProviderIsbn13).unique_key())
                    .col(double_null(BookExternalIds::AverageRating))
                    .col(integer_null(BookExternalIds::RatingsCount))
                    .col(double_null(BookExternalIds::ListPrice))
                    .col(string_null(BookExternalIds::CurrencyCode))
                    .col(string_null(BookExternalIds::Viewability))
                    .col(string_null(BookExternalIds::PreviewLink))
                    .col(string_null(BookExternalIds::InfoLink))
                    .col(timestamp_with_time_zone(BookExternalIds::CreatedAt))
                    .col(timestamp_with_time_zone(BookExternalIds::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_external_ids_book_id")
                            .from(BookExternalIds::Table, BookExternalIds::BookId)
                            .to(Books::Table, Books::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_book_external_ids_source_external_id")
                    .table(BookExternalIds::Table)
                    .col(BookExternalIds::Source)
                    .col(BookExternalIds::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_book_external_ids_book_id")
                    .table(BookExternalIds::Table)
                    .col(BookExternalIds::BookId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookExternalIds::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum BookExternalIds {
    Table,
    Id,
    BookId,
    Source,
    ExternalId,
    ProviderIsbn10,
    ProviderIsbn13,
    AverageRating,
    RatingsCount,
    ListPrice,
    CurrencyCode,
    Viewability,
    PreviewLink,
    InfoLink,
    CreatedAt,
    UpdatedAt,
}
