use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Named grouping of books. collection_type is one of CATEGORY,
/// BESTSELLER_LIST, CURATED_LIST; bestseller lists carry their provider list
/// code. Uniqueness over (type, source, normalized_name) is a partial index
/// on CATEGORY rows, created in the migration.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "book_collections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub collection_type: String,
    pub source: Option<String>,
    pub display_name: String,
    pub normalized_name: String,
    pub list_code: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::book_collection::Entity")]
    BookCollection,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_collection::Relation::Book.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_collection::Relation::Collection.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
