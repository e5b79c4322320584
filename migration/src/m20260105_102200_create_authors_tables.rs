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
                    .table(Authors::Table)
                    .if_not_exists()
                    .col(string(Authors::Id).primary_key())
                    .col(string(Authors::Name).unique_key())
                    .col(string(Authors::NormalizedName))
                    .col(timestamp_with_time_zone(Authors::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_authors_normalized_name")
                    .table(Authors::Table)
                    .col(Authors::NormalizedName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BookAuthorsJoin::Table)
                    .if_not_exists()
                    .col(uuid(BookAuthorsJoin::BookId))
                    .col(string(BookAuthorsJoin::AuthorId))
                    .col(integer(BookAuthorsJoin::Position))
                    .primary_key(
                        Index::create()
                            .col(BookAuthorsJoin::BookId)
                            .col(BookAuthorsJoin::AuthorId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_authors_join_book_id")
                            .from(BookAuthorsJoin::Table, BookAuthorsJoin::BookId)
                            .to(Books::Table, Books::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_authors_join_author_id")
                            .from(BookAuthorsJoin::Table, BookAuthorsJoin::AuthorId)
                            .to(Authors::Table, Authors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookAuthorsJoin::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Authors::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Authors {
    Table,
    Id,
    Name,
    NormalizedName,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum BookAuthorsJoin {
    Table,
    BookId,
    AuthorId,
    Position,
}
