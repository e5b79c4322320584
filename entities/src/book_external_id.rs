use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Provider-side identifier for a book, plus the enrichment columns that only
/// that provider supplies. (source, external_id) is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "book_external_ids")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub book_id: Uuid,
    pub source: String,
    pub external_id: String,
    #[sea_orm(unique)]
    pub provider_isbn10: Option<String>,
    #[sea_orm(unique)]
    pub provider_isbn13: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i32>,
    pub list_price: Option<f64>,
    pub currency_code: Option<String>,
    pub viewability: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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
