//! Identifier resolution: any inbound identifier (canonical key, ISBN-10/13,
//! provider external id, slug) maps to the canonical book key through a fixed
//! ladder, first hit wins.

use entities::{book, book_external_id};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::domain::{isbn, keys};
use crate::error::{HydrateError, HydrateResult};
use crate::store::find_key_by_isbn;

/// Resolve `identifier` to a canonical key, or `NotFound` when no ladder
/// rung matches.
pub async fn resolve<C: ConnectionTrait>(db: &C, identifier: &str) -> HydrateResult<Uuid> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(HydrateError::NotFound);
    }

    // 1. canonical key format, valid only when the row exists
    if keys::is_canonical_key(identifier) {
        if let Ok(key) = Uuid::parse_str(identifier) {
            if book::Entity::find_by_id(key).one(db).await?.is_some() {
                return Ok(key);
            }
        }
    }

    // 2. ISBN (book columns, then the provider-side echo)
    if isbn::classify(identifier).is_some() {
        if let Some(key) = find_key_by_isbn(db, identifier).await? {
            return Ok(key);
        }
    }

    // 3. provider external id, source-agnostic
    if let Some(row) = book_external_id::Entity::find()
        .filter(book_external_id::Column::ExternalId.eq(identifier))
        .one(db)
        .await?
    {
        return Ok(row.book_id);
    }

    // 4. slug
    if let Some(model) = book::Entity::find()
        .filter(book::Column::Slug.eq(identifier))
        .one(db)
        .await?
    {
        return Ok(model.id);
    }

    Err(HydrateError::NotFound)
}
