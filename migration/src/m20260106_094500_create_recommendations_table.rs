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
                    .table(BookRecommendations::Table)
                    .if_not_exists()
                    .col(uuid(BookRecommendations::SourceBookId))
                    .col(uuid(BookRecommendations::TargetBookId))
                    .col(double(BookRecommendations::Score))
                    .col(json_binary(BookRecommendations::Reasons))
                    .col(integer(BookRecommendations::AlgorithmVersion))
                    .col(timestamp_with_time_zone(BookRecommendations::UpdatedAt))
                    .primary_key(
                        Index::create()
                            .col(BookRecommendations::SourceBookId)
                            .col(BookRecommendations::TargetBookId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_recommendations_source_book_id")
                            .from(
                                BookRecommendations::Table,
                                BookRecommendations::SourceBookId,
                            )
                            .to(Books::Table, Books::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_book_recommendations_target_book_id")
                            .from(
                                BookRecommendations::Table,
                                BookRecommendations::TargetBookId,
                            )
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
            .drop_table(Table::drop().table(BookRecommendations::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum BookRecommendations {
    Table,
    SourceBookId,
    TargetBookId,
    Score,
    Reasons,
    AlgorithmVersion,
    UpdatedAt,
}
