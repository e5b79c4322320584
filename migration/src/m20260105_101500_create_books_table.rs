use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Books::Table)
                    .if_not_exists()
                    .col(uuid(Books::Id).primary_key())
                    .col(string_null(Books::Slug).unique_key())
                    .col(string(Books::Title))
                    .col(string_null(Books::Subtitle))
                    .col(text_null(Books::Description))
                    .col(string_null(Books::Publisher))
                    .col(date_null(Books::PublishedDate))
                    .col(string_null(Books::Language))
                    .col(integer_null(Books::PageCount))
                    .col(string_null(Books::Isbn10).unique_key())
                    .col(string_null(Books::Isbn13).unique_key())
                    .col(string_null(Books::CoverPreferredUrl))
                    .col(string_null(Books::CoverFallbackUrl))
                    .col(string_null(Books::CoverSource))
                    .col(integer_null(Books::CoverWidth))
                    .col(integer_null(Books::CoverHeight))
                    .col(boolean_null(Books::CoverHighResolution))
                    .col(string_null(Books::CoverStorageKey))
                    .col(json_binary_null(Books::Qualifiers))
                    .col(timestamp_with_time_zone(Books::CreatedAt))
                    .col(timestamp_with_time_zone(Books::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_books_updated_at")
                    .table(Books::Table)
                    .col(Books::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Books::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Books {
    Table,
    Id,
    Slug,
    Title,
    Subtitle,
    Description,
    Publisher,
    PublishedDate,
    Language,
    PageCount,
    Isbn10,
    Isbn13,
    CoverPreferredUrl,
    CoverFallbackUrl,
    CoverSource,
    CoverWidth,
    CoverHeight,
    CoverHighResolution,
    CoverStorageKey,
    Qualifiers,
    CreatedAt,
    UpdatedAt,
}
