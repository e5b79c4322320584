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
                    .table(BookCollections::Table)
                    .if_not_exists()
                    .col(string(BookCollections::Id).primary_key())
                    .col(string(BookCollections::CollectionType))
                    .col(string_null(BookCollections::Source))
                    .col(string(BookCollections::DisplayName))
                    .col(string(BookCollections::NormalizedName))
                    .col(string_null(BookCollections::ListCode))
                    .col(timestamp_with_time_zone(BookCollections::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Categories are deduplicated by (type, source, normalized_name);
        // bestseller and curated lists may repeat names across weeks.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_book_collections_category \
                 ON book_collections (collection_type, coalesce(source, ''), normalized_name) \
                 WHERE collection_type = 'CATEGORY'",
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_book_collections_normalized_name")
                    .table(BookCollections::Table)
                    .col(BookCollections::NormalizedName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BookCollectionsJoin::Table)
                    .if_not_exists()
                    .col(string(BookCollectionsJoin::CollectionId))
                    .col(uuid(BookCollectionsJoin::BookId))
                    .col(integer_null(BookCollectionsJoin::Rank))
                    .col(integer_null(BookCollectionsJoin::WeeksOnList))
                    .col(timestamp_with_time_zone(BookCollectionsJoin::CreatedAt))
                    .primary_key(
                        Index::create()
                            .col(BookCollectionsJoin::CollectionId)
                            .col(BookCollectionsJoin::BookId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_collections_join_collection_id")
                            .from(BookCollectionsJoin::Table, BookCollectionsJoin::CollectionId)
                            .to(BookCollections::Table, BookCollections::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_collections_join_book_id")
                            .from(BookCollectionsJoin::Table, BookCollectionsJoin::BookId)
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
            .drop_table(Table::drop().table(BookCollectionsJoin::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BookCollections::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum BookCollections {
    Table,
    Id,
    CollectionType,
    Source,
    DisplayName,
    NormalizedName,
    ListCode,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum BookCollectionsJoin {
    Table,
    CollectionId,
    BookId,
    Rank,
    WeeksOnList,
    CreatedAt,
}
