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
                    .table(BookRawData::Table)
                    .if_not_exists()
                    .col(string(BookRawData::Id).primary_key())
                    .col(uuid(BookRawData::BookId))
                    .col(string(BookRawData::Source))
                    .col(text(BookRawData::Payload))
                    .col(timestamp_with_time_zone(BookRawData::FetchedAt))
                    .col(timestamp_with_time_zone_null(BookRawData::ContributedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_raw_data_book_id")
                            .from(BookRawData::Table, BookRawData::BookId)
                            .to(Books::Table, Books::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_book_raw_data_book_id_source")
                    .table(BookRawData::Table)
                    .col(BookRawData::BookId)
                    .col(BookRawData::Source)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookRawData::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum BookRawData {
    Table,
    Id,
    BookId,
    Source,
    Payload,
    FetchedAt,
    ContributedAt,
}
