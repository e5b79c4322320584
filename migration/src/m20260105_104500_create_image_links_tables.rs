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
                    .table(BookImageLinks::Table)
                    .if_not_exists()
                    .col(string(BookImageLinks::Id).primary_key())
                    .col(uuid(BookImageLinks::BookId))
                    .col(string(BookImageLinks::ImageType))
                    .col(string(BookImageLinks::Url))
                    .col(string_null(BookImageLinks::Source))
                    .col(integer_null(BookImageLinks::Width))
                    .col(integer_null(BookImageLinks::Height))
                    .col(timestamp_with_time_zone(BookImageLinks::CreatedAt))
                    .col(timestamp_with_time_zone(BookImageLinks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_image_links_book_id")
                            .from(BookImageLinks::Table, BookImageLinks::BookId)
                            .to(Books::Table, Books::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_book_image_links_book_id_image_type")
                    .table(BookImageLinks::Table)
                    .col(BookImageLinks::BookId)
                    .col(BookImageLinks::ImageType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BookDimensions::Table)
                    .if_not_exists()
                    .col(uuid(BookDimensions::BookId).primary_key())
                    .col(double_null(BookDimensions::HeightCm))
                    .col(double_null(BookDimensions::WidthCm))
                    .col(double_null(BookDimensions::ThicknessCm))
                    .col(timestamp_with_time_zone(BookDimensions::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_dimensions_book_id")
                            .from(BookDimensions::Table, BookDimensions::BookId)
                            .to(Books::Table, Books::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookDimensions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BookImageLinks::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum BookImageLinks {
    Table,
    Id,
    BookId,
    ImageType,
    Url,
    Source,
    Width,
    Height,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum BookDimensions {
    Table,
    BookId,
    HeightCm,
    WidthCm,
    ThicknessCm,
    UpdatedAt,
}
