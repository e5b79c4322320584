//! Canonical persistence: the relational book graph, its hydration back into
//! domain records, and the identity-safe upsert. All writes for one book
//! serialize through a per-key lock and run inside a single transaction.

pub mod key_lock;
pub mod search;
pub mod upsert;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use entities::{
    author, book, book_author, book_collection, book_dimensions, book_external_id,
    book_image_link, collection,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Statement,
};
use uuid::Uuid;

use crate::domain::isbn;
use crate::domain::models::{Book, CoverSource, CoverState, Dimensions, ProviderSource};
use crate::error::{HydrateError, HydrateResult};
use key_lock::KeyLocks;

pub struct CanonicalStore {
    db: DatabaseConnection,
    locks: KeyLocks,
}

impl CanonicalStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            locks: KeyLocks::new(),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub(crate) fn locks(&self) -> &KeyLocks {
        &self.locks
    }

    pub async fn fetch_by_key(&self, key: Uuid) -> HydrateResult<Book> {
        let model = book::Entity::find_by_id(key)
            .one(&self.db)
            .await?
            .ok_or(HydrateError::NotFound)?;
        hydrate(&self.db, model).await
    }

    pub async fn fetch_by_slug(&self, slug: &str) -> HydrateResult<Book> {
        let model = book::Entity::find()
            .filter(book::Column::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or(HydrateError::NotFound)?;
        hydrate(&self.db, model).await
    }

    /// Lookup by sanitized ISBN, falling back to the provider-side echo on
    /// the external-id rows when the book row itself carries no ISBN.
    pub async fn fetch_by_isbn(&self, raw: &str) -> HydrateResult<Book> {
        let key = find_key_by_isbn(&self.db, raw)
            .await?
            .ok_or(HydrateError::NotFound)?;
        self.fetch_by_key(key).await
    }

    pub async fn fetch_by_external(&self, source: &str, external_id: &str) -> HydrateResult<Book> {
        let row = book_external_id::Entity::find()
            .filter(book_external_id::Column::Source.eq(source))
            .filter(book_external_id::Column::ExternalId.eq(external_id))
            .one(&self.db)
            .await?
            .ok_or(HydrateError::NotFound)?;
        self.fetch_by_key(row.book_id).await
    }

    /// (slug, updated_at) pairs for the sitemap snapshot.
    pub async fn slug_snapshot(&self) -> HydrateResult<Vec<(String, DateTime<Utc>)>> {
        let rows: Vec<(Option<String>, DateTime<Utc>)> = book::Entity::find()
            .select_only()
            .column(book::Column::Slug)
            .column(book::Column::UpdatedAt)
            .filter(book::Column::Slug.is_not_null())
            .order_by_asc(book::Column::Slug)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(slug, updated_at)| slug.map(|s| (s, updated_at)))
            .collect())
    }

    /// Most recently touched books, for cache warming.
    pub async fn recently_updated_keys(&self, limit: u64) -> HydrateResult<Vec<Uuid>> {
        let rows: Vec<Uuid> = book::Entity::find()
            .select_only()
            .column(book::Column::Id)
            .order_by_desc(book::Column::UpdatedAt)
            .limit(limit)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Candidate books sharing at least one author with `key`.
    pub async fn author_peers(&self, key: Uuid) -> HydrateResult<Vec<Uuid>> {
        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "SELECT DISTINCT j2.book_id AS peer_id \
                 FROM book_authors_join j1 \
                 JOIN book_authors_join j2 ON j2.author_id = j1.author_id \
                 WHERE j1.book_id = $1 AND j2.book_id <> $1",
                [key.into()],
            ))
            .await?;
        let mut peers = Vec::with_capacity(rows.len());
        for row in rows {
            peers.push(row.try_get("", "peer_id")?);
        }
        Ok(peers)
    }

    /// Candidate books sharing CATEGORY collections with `key`, with the
    /// shared count and each candidate's own category count.
    pub async fn category_peers(&self, key: Uuid) -> HydrateResult<Vec<CategoryPeer>> {
        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "SELECT j2.book_id AS peer_id, \
                        COUNT(*) AS shared, \
                        (SELECT COUNT(*) FROM book_collections_join jt \
                         JOIN book_collections ct ON ct.id = jt.collection_id \
                         WHERE jt.book_id = j2.book_id AND ct.collection_type = 'CATEGORY') AS total \
                 FROM book_collections_join j1 \
                 JOIN book_collections c ON c.id = j1.collection_id \
                      AND c.collection_type = 'CATEGORY' \
                 JOIN book_collections_join j2 ON j2.collection_id = j1.collection_id \
                 WHERE j1.book_id = $1 AND j2.book_id <> $1 \
                 GROUP BY j2.book_id",
                [key.into()],
            ))
            .await?;
        let mut peers = Vec::with_capacity(rows.len());
        for row in rows {
            peers.push(CategoryPeer {
                book_id: row.try_get("", "peer_id")?,
                shared: row.try_get::<i64>("", "shared")? as u32,
                candidate_total: row.try_get::<i64>("", "total")? as u32,
            });
        }
        Ok(peers)
    }

    /// Number of CATEGORY memberships for a book.
    pub async fn category_count(&self, key: Uuid) -> HydrateResult<u32> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "SELECT COUNT(*) AS total FROM book_collections_join j \
                 JOIN book_collections c ON c.id = j.collection_id \
                 WHERE j.book_id = $1 AND c.collection_type = 'CATEGORY'",
                [key.into()],
            ))
            .await?;
        Ok(row
            .map(|r| r.try_get::<i64>("", "total"))
            .transpose()?
            .unwrap_or(0) as u32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPeer {
    pub book_id: Uuid,
    pub shared: u32,
    pub candidate_total: u32,
}

/// Resolve an ISBN (either length) to a canonical key, checking the book row
/// first and the provider echo columns second.
pub async fn find_key_by_isbn<C: ConnectionTrait>(
    db: &C,
    raw: &str,
) -> HydrateResult<Option<Uuid>> {
    let Some(classified) = isbn::classify(raw) else {
        return Ok(None);
    };
    let (book_filter, echo_filter) = match &classified {
        isbn::Isbn::Thirteen(v) => (
            book::Column::Isbn13.eq(v.clone()),
            book_external_id::Column::ProviderIsbn13.eq(v.clone()),
        ),
        isbn::Isbn::Ten(v) => (
            book::Column::Isbn10.eq(v.clone()),
            book_external_id::Column::ProviderIsbn10.eq(v.clone()),
        ),
    };
    if let Some(model) = book::Entity::find().filter(book_filter).one(db).await? {
        return Ok(Some(model.id));
    }
    if let Some(row) = book_external_id::Entity::find()
        .filter(echo_filter)
        .one(db)
        .await?
    {
        return Ok(Some(row.book_id));
    }
    Ok(None)
}

/// Load a full domain book from its row plus the owned relation rows.
pub async fn hydrate<C: ConnectionTrait>(db: &C, model: book::Model) -> HydrateResult<Book> {
    let key = model.id;
    let mut out = model_to_book(model);

    // authors in position order
    let joins = book_author::Entity::find()
        .filter(book_author::Column::BookId.eq(key))
        .order_by_asc(book_author::Column::Position)
        .all(db)
        .await?;
    if !joins.is_empty() {
        let ids: Vec<String> = joins.iter().map(|j| j.author_id.clone()).collect();
        let names: HashMap<String, String> = author::Entity::find()
            .filter(author::Column::Id.is_in(ids))
            .all(db)
            .await?
            .into_iter()
            .map(|a| (a.id, a.name))
            .collect();
        out.authors = joins
            .iter()
            .filter_map(|j| names.get(&j.author_id).cloned())
            .collect();
    }

    // categories
    let memberships = book_collection::Entity::find()
        .filter(book_collection::Column::BookId.eq(key))
        .all(db)
        .await?;
    if !memberships.is_empty() {
        let ids: Vec<String> = memberships
            .iter()
            .map(|m| m.collection_id.clone())
            .collect();
        out.categories = collection::Entity::find()
            .filter(collection::Column::Id.is_in(ids))
            .filter(collection::Column::CollectionType.eq("CATEGORY"))
            .all(db)
            .await?
            .into_iter()
            .map(|c| c.display_name)
            .collect();
    }

    // image links
    for link in book_image_link::Entity::find()
        .filter(book_image_link::Column::BookId.eq(key))
        .all(db)
        .await?
    {
        out.image_links.insert(link.image_type, link.url);
    }

    // dimensions
    if let Some(dims) = book_dimensions::Entity::find_by_id(key).one(db).await? {
        out.dimensions = Some(Dimensions {
            height_cm: dims.height_cm,
            width_cm: dims.width_cm,
            thickness_cm: dims.thickness_cm,
        });
    }

    // primary external id by source precedence, plus its enrichment columns
    let mut externals = book_external_id::Entity::find()
        .filter(book_external_id::Column::BookId.eq(key))
        .all(db)
        .await?;
    externals.sort_by_key(|row| {
        ProviderSource::parse(&row.source)
            .map(|s| s.precedence())
            .unwrap_or(u8::MAX)
    });
    if let Some(primary) = externals.into_iter().next() {
        out.external_id = Some(primary.external_id);
        out.source = ProviderSource::parse(&primary.source);
        out.average_rating = primary.average_rating;
        out.ratings_count = primary.ratings_count;
        out.list_price = primary.list_price;
        out.currency_code = primary.currency_code;
        out.viewability = primary.viewability;
        out.preview_link = primary.preview_link;
        out.info_link = primary.info_link;
    }

    Ok(out)
}

fn model_to_book(model: book::Model) -> Book {
    let qualifiers = model
        .qualifiers
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    Book {
        id: Some(model.id),
        slug: model.slug,
        title: model.title,
        subtitle: model.subtitle,
        description: model.description,
        publisher: model.publisher,
        published_date: model.published_date,
        language: model.language,
        page_count: model.page_count,
        isbn10: model.isbn10,
        isbn13: model.isbn13,
        cover: CoverState {
            preferred_url: model.cover_preferred_url,
            fallback_url: model.cover_fallback_url,
            source: model
                .cover_source
                .as_deref()
                .and_then(CoverSource::parse)
                .unwrap_or_default(),
            width: model.cover_width,
            height: model.cover_height,
            high_resolution: model.cover_high_resolution.unwrap_or(false),
            storage_key: model.cover_storage_key,
        },
        qualifiers,
        ..Book::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_to_book_maps_cover_state() {
        let model = book::Model {
            id: Uuid::nil(),
            slug: Some("the-shining-stephen-king".into()),
            title: "The Shining".into(),
            subtitle: None,
            description: None,
            publisher: None,
            published_date: None,
            language: Some("en".into()),
            page_count: Some(688),
            isbn10: None,
            isbn13: Some("9780307743657".into()),
            cover_preferred_url: Some("https://cdn/cover.jpg".into()),
            cover_fallback_url: None,
            cover_source: Some("OPEN_LIBRARY".into()),
            cover_width: Some(800),
            cover_height: Some(1200),
            cover_high_resolution: Some(true),
            cover_storage_key: None,
            qualifiers: Some(serde_json::json!({"nytBestseller": {"rank": 1}})),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let book = model_to_book(model);
        assert_eq!(book.cover.source, CoverSource::OpenLibrary);
        assert!(book.cover.high_resolution);
        assert_eq!(book.slug.as_deref(), Some("the-shining-stephen-king"));
        assert!(book.qualifiers.contains_key("nytBestseller"));
    }
}
