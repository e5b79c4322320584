use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Raw provider payload, one row per (book, source), replaced on each fresh
/// fetch. The payload column keeps the JSON text exactly as cached upstream.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "book_raw_data")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub book_id: Uuid,
    pub source: String,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub fetched_at: DateTimeUtc,
    pub contributed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::BookId",
        to = "super::book::Column::Id",
        on_delete = "Cascade"
    )]
    Book,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
