use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Canonical book row. The id is a time-ordered UUID (v7) so rows sort by
/// creation time; slug and both ISBN columns are unique over non-null values.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub slug: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<Date>,
    pub language: Option<String>,
    pub page_count: Option<i32>,
    #[sea_orm(unique)]
    pub isbn10: Option<String>,
    #[sea_orm(unique)]
    pub isbn13: Option<String>,
    pub cover_preferred_url: Option<String>,
    pub cover_fallback_url: Option<String>,
    pub cover_source: Option<String>,
    pub cover_width: Option<i32>,
    pub cover_height: Option<i32>,
    pub cover_high_resolution: Option<bool>,
    pub cover_storage_key: Option<String>,
    pub qualifiers: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::book_external_id::Entity")]
    BookExternalId,
    #[sea_orm(has_many = "super::book_raw_data::Entity")]
    BookRawData,
    #[sea_orm(has_many = "super::book_image_link::Entity")]
    BookImageLink,
    #[sea_orm(has_one = "super::book_dimensions::Entity")]
    BookDimensions,
    #[sea_orm(has_many = "super::book_author::Entity")]
    BookAuthor,
    #[sea_orm(has_many = "super::book_collection::Entity")]
    BookCollection,
}

impl Related<super::book_external_id::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookExternalId.def()
    }
}

impl Related<super::book_raw_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookRawData.def()
    }
}

impl Related<super::book_image_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookImageLink.def()
    }
}

impl Related<super::book_dimensions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookDimensions.def()
    }
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_author::Relation::Author.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_author::Relation::Book.def().rev())
    }
}

impl Related<super::collection::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_collection::Relation::Collection.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_collection::Relation::Book.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
