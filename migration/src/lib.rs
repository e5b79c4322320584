pub use sea_orm_migration::prelude::*;

mod m20260105_101500_create_books_table;
mod m20260105_102200_create_authors_tables;
mod m20260105_103000_create_external_ids_table;
mod m20260105_103800_create_raw_data_table;
mod m20260105_104500_create_image_links_tables;
mod m20260106_091000_create_collections_tables;
mod m20260106_094500_create_recommendations_table;
mod m20260107_120000_create_search_support;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260105_101500_create_books_table::Migration),
            Box::new(m20260105_102200_create_authors_tables::Migration),
            Box::new(m20260105_103000_create_external_ids_table::Migration),
            Box::new(m20260105_103800_create_raw_data_table::Migration),
            Box::new(m20260105_104500_create_image_links_tables::Migration),
            Box::new(m20260106_091000_create_collections_tables::Migration),
            Box::new(m20260106_094500_create_recommendations_table::Migration),
            Box::new(m20260107_120000_create_search_support::Migration),
        ]
    }
}
