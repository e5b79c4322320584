use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Similarity edge from one book to another, scored in [0,1] with the reason
/// tags that contributed and the scoring algorithm version.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "book_recommendations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_book_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub target_book_id: Uuid,
    pub score: f64,
    pub reasons: Json,
    pub algorithm_version: i32,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::SourceBookId",
        to = "super::book::Column::Id",
        on_delete = "Cascade"
    )]
    SourceBook,
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::TargetBookId",
        to = "super::book::Column::Id",
        on_delete = "Cascade"
    )]
    TargetBook,
}

impl ActiveModelBehavior for ActiveModel {}
