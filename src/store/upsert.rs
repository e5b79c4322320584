//! The idempotent upsert of a book graph. One transaction per call, guarded
//! by the per-identity lock; incoming non-null values overwrite, incoming
//! nulls never clobber stored values.

use std::collections::BTreeMap;

use chrono::Utc;
use entities::{
    author, book, book_author, book_collection, book_dimensions, book_external_id,
    book_image_link, book_raw_data, collection,
};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use uuid::Uuid;

use super::{CanonicalStore, find_key_by_isbn, search};
use crate::domain::author_names::normalize_author;
use crate::domain::keys;
use crate::domain::models::{Book, CoverState, ProviderSource};
use crate::domain::slug::{book_slug, slugify};
use crate::error::{HydrateError, HydrateResult};

impl CanonicalStore {
    /// Persist `incoming` and its raw payloads, returning the canonical key.
    /// The whole graph write happens in a single transaction; any error
    /// rolls back and surfaces.
    #[tracing::instrument(level = "debug", skip_all, fields(title = %incoming.title))]
    pub async fn upsert(
        &self,
        incoming: &Book,
        raw_payloads: &[(ProviderSource, String)],
    ) -> HydrateResult<Uuid> {
        let _guard = self.locks().lock(&identity_lock_key(incoming)).await;
        let txn = self.connection().begin().await?;
        match upsert_in_txn(&txn, incoming, raw_payloads).await {
            Ok(key) => {
                txn.commit().await?;
                Ok(key)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    /// Write the resolved cover state onto the book row. Monotonicity
    /// (provisional never replaces final) is enforced by the orchestrator.
    pub async fn set_cover_state(&self, key: Uuid, cover: &CoverState) -> HydrateResult<()> {
        let _guard = self.locks().lock(&key.to_string()).await;
        let existing = book::Entity::find_by_id(key)
            .one(self.connection())
            .await?
            .ok_or(HydrateError::NotFound)?;
        let mut active: book::ActiveModel = existing.into();
        active.cover_preferred_url = Set(cover.preferred_url.clone());
        active.cover_fallback_url = Set(cover.fallback_url.clone());
        active.cover_source = Set(Some(cover.source.as_str().to_string()));
        active.cover_width = Set(cover.width);
        active.cover_height = Set(cover.height);
        active.cover_high_resolution = Set(Some(cover.high_resolution));
        active.cover_storage_key = Set(cover.storage_key.clone());
        active.updated_at = Set(Utc::now());
        active.update(self.connection()).await?;
        Ok(())
    }

    /// Merge cover-selection provenance into the book's raw payload (the
    /// aggregated row when present, the primary row otherwise) for audit.
    pub async fn attach_cover_provenance(
        &self,
        key: Uuid,
        provenance: serde_json::Value,
    ) -> HydrateResult<()> {
        let db = self.connection();
        let rows = book_raw_data::Entity::find()
            .filter(book_raw_data::Column::BookId.eq(key))
            .all(db)
            .await?;
        let Some(target) = rows
            .iter()
            .find(|row| row.source == ProviderSource::Aggregated.as_str())
            .or_else(|| rows.first())
            .cloned()
        else {
            tracing::debug!(book_id = %key, "no raw payload to attach cover provenance to");
            return Ok(());
        };
        let Ok(mut payload) = serde_json::from_str::<serde_json::Value>(&target.payload) else {
            return Ok(());
        };
        if let Some(object) = payload.as_object_mut() {
            object.insert("coverProvenance".into(), provenance);
            let mut active: book_raw_data::ActiveModel = target.into();
            active.payload = Set(serde_json::to_string(&payload)?);
            active.update(db).await?;
        }
        Ok(())
    }

    /// Record membership of a book in a bestseller list, creating the
    /// collection row on first sight of the list code.
    pub async fn upsert_bestseller_membership(
        &self,
        key: Uuid,
        list_code: &str,
        display_name: &str,
        rank: Option<i32>,
        weeks_on_list: Option<i32>,
    ) -> HydrateResult<()> {
        let db = self.connection();
        let now = Utc::now();
        let collection_id = match collection::Entity::find()
            .filter(collection::Column::CollectionType.eq("BESTSELLER_LIST"))
            .filter(collection::Column::Source.eq("NYT"))
            .filter(collection::Column::ListCode.eq(list_code))
            .one(db)
            .await?
        {
            Some(existing) => existing.id,
            None => {
                let id = keys::short_id();
                collection::ActiveModel {
                    id: Set(id.clone()),
                    collection_type: Set("BESTSELLER_LIST".into()),
                    source: Set(Some("NYT".into())),
                    display_name: Set(display_name.to_string()),
                    normalized_name: Set(slugify(display_name)),
                    list_code: Set(Some(list_code.to_string())),
                    created_at: Set(now),
                }
                .insert(db)
                .await?;
                id
            }
        };

        match book_collection::Entity::find_by_id((collection_id.clone(), key))
            .one(db)
            .await?
        {
            Some(existing) => {
                let mut active: book_collection::ActiveModel = existing.into();
                active.rank = Set(rank);
                active.weeks_on_list = Set(weeks_on_list);
                active.update(db).await?;
            }
            None => {
                book_collection::ActiveModel {
                    collection_id: Set(collection_id),
                    book_id: Set(key),
                    rank: Set(rank),
                    weeks_on_list: Set(weeks_on_list),
                    created_at: Set(now),
                }
                .insert(db)
                .await?;
            }
        }
        Ok(())
    }
}

/// Serialization handle for the per-key lock: the canonical key when known,
/// otherwise the strongest identity the incoming record carries.
fn identity_lock_key(book: &Book) -> String {
    if let Some(id) = book.id {
        return id.to_string();
    }
    if let Some(isbn13) = &book.isbn13 {
        return format!("isbn13:{isbn13}");
    }
    if let Some(isbn10) = &book.isbn10 {
        return format!("isbn10:{isbn10}");
    }
    if let (Some(source), Some(external_id)) = (external_source(book), &book.external_id) {
        return format!("ext:{}:{external_id}", source.as_str());
    }
    format!("title:{}", book.title.to_lowercase())
}

/// The provider that owns the external id on this record: the record's own
/// source unless it is an aggregate, then the strongest contributor.
fn external_source(book: &Book) -> Option<ProviderSource> {
    match book.source {
        Some(ProviderSource::Aggregated) | None => book
            .contributing_sources
            .iter()
            .copied()
            .min_by_key(|s| s.precedence()),
        Some(source) => Some(source),
    }
}

async fn upsert_in_txn<C: ConnectionTrait>(
    txn: &C,
    incoming: &Book,
    raw_payloads: &[(ProviderSource, String)],
) -> HydrateResult<Uuid> {
    let now = Utc::now();
    let existing = resolve_existing(txn, incoming).await?;
    let key = match &existing {
        Some(model) => model.id,
        None => incoming.id.unwrap_or_else(keys::canonical_key),
    };

    // books row
    match existing {
        Some(model) => {
            let mut active: book::ActiveModel = model.clone().into();
            if !incoming.title.trim().is_empty() {
                active.title = Set(incoming.title.clone());
            }
            coalesce_set(&mut active.subtitle, &incoming.subtitle);
            coalesce_set(&mut active.description, &incoming.description);
            coalesce_set(&mut active.publisher, &incoming.publisher);
            coalesce_set(&mut active.published_date, &incoming.published_date);
            coalesce_set(&mut active.language, &incoming.language);
            coalesce_set(&mut active.page_count, &incoming.page_count);
            coalesce_set(&mut active.isbn10, &incoming.isbn10);
            coalesce_set(&mut active.isbn13, &incoming.isbn13);
            // cover columns belong to the orchestrator; only fill blanks
            if model.cover_preferred_url.is_none() {
                if let Some(url) = &incoming.cover.preferred_url {
                    active.cover_preferred_url = Set(Some(url.clone()));
                    active.cover_source = Set(Some(incoming.cover.source.as_str().to_string()));
                    active.cover_width = Set(incoming.cover.width);
                    active.cover_height = Set(incoming.cover.height);
                }
            }
            let mut qualifiers: BTreeMap<String, serde_json::Value> = model
                .qualifiers
                .clone()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            for (k, v) in &incoming.qualifiers {
                qualifiers.insert(k.clone(), v.clone());
            }
            if !qualifiers.is_empty() {
                active.qualifiers = Set(Some(serde_json::to_value(&qualifiers)?));
            }
            active.updated_at = Set(now);
            active.update(txn).await?;
        }
        None => {
            let title = if incoming.title.trim().is_empty() {
                incoming
                    .external_id
                    .clone()
                    .unwrap_or_else(|| key.to_string())
            } else {
                incoming.title.clone()
            };
            let base = book_slug(&title, incoming.first_author());
            let slug = if base.is_empty() {
                None
            } else {
                Some(search::ensure_unique_slug(txn, &base).await?)
            };
            book::ActiveModel {
                id: Set(key),
                slug: Set(slug),
                title: Set(title),
                subtitle: Set(incoming.subtitle.clone()),
                description: Set(incoming.description.clone()),
                publisher: Set(incoming.publisher.clone()),
                published_date: Set(incoming.published_date),
                language: Set(incoming.language.clone()),
                page_count: Set(incoming.page_count),
                isbn10: Set(incoming.isbn10.clone()),
                isbn13: Set(incoming.isbn13.clone()),
                cover_preferred_url: Set(incoming.cover.preferred_url.clone()),
                cover_fallback_url: Set(incoming.cover.fallback_url.clone()),
                cover_source: Set(incoming
                    .cover
                    .preferred_url
                    .is_some()
                    .then(|| incoming.cover.source.as_str().to_string())),
                cover_width: Set(incoming.cover.width),
                cover_height: Set(incoming.cover.height),
                cover_high_resolution: Set(Some(incoming.cover.high_resolution)),
                cover_storage_key: Set(incoming.cover.storage_key.clone()),
                qualifiers: Set(if incoming.qualifiers.is_empty() {
                    None
                } else {
                    Some(serde_json::to_value(&incoming.qualifiers)?)
                }),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
        }
    }

    upsert_external_id(txn, key, incoming).await?;
    replace_raw_payloads(txn, key, incoming, raw_payloads).await?;
    upsert_image_links(txn, key, incoming).await?;
    upsert_dimensions(txn, key, incoming).await?;
    upsert_authors(txn, key, incoming).await?;
    upsert_categories(txn, key, incoming).await?;

    Ok(key)
}

/// Resolution order: (source, external id), then ISBN-13, then ISBN-10.
async fn resolve_existing<C: ConnectionTrait>(
    txn: &C,
    incoming: &Book,
) -> HydrateResult<Option<book::Model>> {
    if let Some(key) = incoming.id {
        if let Some(model) = book::Entity::find_by_id(key).one(txn).await? {
            return Ok(Some(model));
        }
    }
    if let (Some(source), Some(external_id)) = (external_source(incoming), &incoming.external_id) {
        if let Some(row) = book_external_id::Entity::find()
            .filter(book_external_id::Column::Source.eq(source.as_str()))
            .filter(book_external_id::Column::ExternalId.eq(external_id))
            .one(txn)
            .await?
        {
            return Ok(book::Entity::find_by_id(row.book_id).one(txn).await?);
        }
    }
    for raw in [&incoming.isbn13, &incoming.isbn10].into_iter().flatten() {
        if let Some(key) = find_key_by_isbn(txn, raw).await? {
            return Ok(book::Entity::find_by_id(key).one(txn).await?);
        }
    }
    Ok(None)
}

/// Field-level coalesce: a non-null incoming value overwrites, a null one
/// leaves the stored value alone.
fn coalesce_set<T>(target: &mut sea_orm::ActiveValue<Option<T>>, incoming: &Option<T>)
where
    T: Clone,
    Option<T>: Into<sea_orm::Value>,
{
    if incoming.is_some() {
        *target = Set(incoming.clone());
    }
}

/// The provider-side ISBN echo must stay unique across external ids; when a
/// different external id already carries it, store null and keep the linkage
/// on the book row.
async fn echo_if_unclaimed<C: ConnectionTrait>(
    txn: &C,
    column: book_external_id::Column,
    value: &Option<String>,
    source: &str,
    external_id: &str,
) -> HydrateResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let claimed = book_external_id::Entity::find()
        .filter(column.eq(value.clone()))
        .one(txn)
        .await?;
    match claimed {
        Some(row) if row.source != source || row.external_id != external_id => {
            tracing::warn!(
                isbn = %value,
                claimed_by = %format!("{}:{}", row.source, row.external_id),
                incoming = %format!("{source}:{external_id}"),
                "ISBN echo already linked through another external id; storing null"
            );
            Ok(None)
        }
        _ => Ok(Some(value.clone())),
    }
}

async fn upsert_external_id<C: ConnectionTrait>(
    txn: &C,
    key: Uuid,
    incoming: &Book,
) -> HydrateResult<()> {
    let (Some(source), Some(external_id)) = (external_source(incoming), &incoming.external_id)
    else {
        return Ok(());
    };
    let source = source.as_str();
    let now = Utc::now();

    let echo13 = echo_if_unclaimed(
        txn,
        book_external_id::Column::ProviderIsbn13,
        &incoming.isbn13,
        source,
        external_id,
    )
    .await?;
    let echo10 = echo_if_unclaimed(
        txn,
        book_external_id::Column::ProviderIsbn10,
        &incoming.isbn10,
        source,
        external_id,
    )
    .await?;

    let existing = book_external_id::Entity::find()
        .filter(book_external_id::Column::Source.eq(source))
        .filter(book_external_id::Column::ExternalId.eq(external_id))
        .one(txn)
        .await?;

    match existing {
        Some(model) => {
            let mut active: book_external_id::ActiveModel = model.clone().into();
            coalesce_set(&mut active.provider_isbn13, &echo13);
            coalesce_set(&mut active.provider_isbn10, &echo10);
            coalesce_set(&mut active.average_rating, &incoming.average_rating);
            coalesce_set(&mut active.ratings_count, &incoming.ratings_count);
            coalesce_set(&mut active.list_price, &incoming.list_price);
            coalesce_set(&mut active.currency_code, &incoming.currency_code);
            coalesce_set(&mut active.viewability, &incoming.viewability);
            coalesce_set(&mut active.preview_link, &incoming.preview_link);
            coalesce_set(&mut active.info_link, &incoming.info_link);
            active.updated_at = Set(now);
            active.update(txn).await?;
        }
        None => {
            book_external_id::ActiveModel {
                id: Set(keys::short_id()),
                book_id: Set(key),
                source: Set(source.to_string()),
                external_id: Set(external_id.clone()),
                provider_isbn13: Set(echo13),
                provider_isbn10: Set(echo10),
                average_rating: Set(incoming.average_rating),
                ratings_count: Set(incoming.ratings_count),
                list_price: Set(incoming.list_price),
                currency_code: Set(incoming.currency_code.clone()),
                viewability: Set(incoming.viewability.clone()),
                preview_link: Set(incoming.preview_link.clone()),
                info_link: Set(incoming.info_link.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
        }
    }
    Ok(())
}

async fn replace_raw_payloads<C: ConnectionTrait>(
    txn: &C,
    key: Uuid,
    incoming: &Book,
    raw_payloads: &[(ProviderSource, String)],
) -> HydrateResult<()> {
    let now = Utc::now();
    for (source, payload) in raw_payloads {
        let contributed = incoming.contributing_sources.contains(source)
            || incoming.source == Some(*source);
        let existing = book_raw_data::Entity::find()
            .filter(book_raw_data::Column::BookId.eq(key))
            .filter(book_raw_data::Column::Source.eq(source.as_str()))
            .one(txn)
            .await?;
        match existing {
            Some(model) => {
                let mut active: book_raw_data::ActiveModel = model.into();
                active.payload = Set(payload.clone());
                active.fetched_at = Set(now);
                if contributed {
                    active.contributed_at = Set(Some(now));
                }
                active.update(txn).await?;
            }
            None => {
                book_raw_data::ActiveModel {
                    id: Set(keys::short_id()),
                    book_id: Set(key),
                    source: Set(source.as_str().to_string()),
                    payload: Set(payload.clone()),
                    fetched_at: Set(now),
                    contributed_at: Set(contributed.then_some(now)),
                }
                .insert(txn)
                .await?;
            }
        }
    }
    Ok(())
}

/// Additive per image type: existing rows update, new rows insert, rows for
/// types absent from the incoming record stay.
async fn upsert_image_links<C: ConnectionTrait>(
    txn: &C,
    key: Uuid,
    incoming: &Book,
) -> HydrateResult<()> {
    let now = Utc::now();
    let source_tag = external_source(incoming).map(|s| s.as_str().to_string());
    for (image_type, url) in &incoming.image_links {
        let existing = book_image_link::Entity::find()
            .filter(book_image_link::Column::BookId.eq(key))
            .filter(book_image_link::Column::ImageType.eq(image_type))
            .one(txn)
            .await?;
        match existing {
            Some(model) => {
                if model.url != *url {
                    let mut active: book_image_link::ActiveModel = model.into();
                    active.url = Set(url.clone());
                    active.source = Set(source_tag.clone());
                    active.updated_at = Set(now);
                    active.update(txn).await?;
                }
            }
            None => {
                book_image_link::ActiveModel {
                    id: Set(keys::short_id()),
                    book_id: Set(key),
                    image_type: Set(image_type.clone()),
                    url: Set(url.clone()),
                    source: Set(source_tag.clone()),
                    width: Set(None),
                    height: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
            }
        }
    }
    Ok(())
}

async fn upsert_dimensions<C: ConnectionTrait>(
    txn: &C,
    key: Uuid,
    incoming: &Book,
) -> HydrateResult<()> {
    let Some(dims) = incoming.dimensions else {
        return Ok(());
    };
    let now = Utc::now();
    match book_dimensions::Entity::find_by_id(key).one(txn).await? {
        Some(model) => {
            let mut active: book_dimensions::ActiveModel = model.clone().into();
            coalesce_set(&mut active.height_cm, &dims.height_cm);
            coalesce_set(&mut active.width_cm, &dims.width_cm);
            coalesce_set(&mut active.thickness_cm, &dims.thickness_cm);
            active.updated_at = Set(now);
            active.update(txn).await?;
        }
        None => {
            book_dimensions::ActiveModel {
                book_id: Set(key),
                height_cm: Set(dims.height_cm),
                width_cm: Set(dims.width_cm),
                thickness_cm: Set(dims.thickness_cm),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
        }
    }
    Ok(())
}

/// Authors are shared rows unique by display name; join rows are rewritten
/// so positions stay contiguous from 0. An empty incoming list preserves the
/// stored one.
async fn upsert_authors<C: ConnectionTrait>(
    txn: &C,
    key: Uuid,
    incoming: &Book,
) -> HydrateResult<()> {
    if incoming.authors.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    let mut author_ids = Vec::with_capacity(incoming.authors.len());
    for name in &incoming.authors {
        let existing = author::Entity::find()
            .filter(author::Column::Name.eq(name))
            .one(txn)
            .await?;
        let id = match existing {
            Some(model) => model.id,
            None => {
                let id = keys::short_id();
                author::ActiveModel {
                    id: Set(id.clone()),
                    name: Set(name.clone()),
                    normalized_name: Set(normalize_author(name)),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;
                id
            }
        };
        // a provider may list the same contributor twice
        if !author_ids.contains(&id) {
            author_ids.push(id);
        }
    }

    book_author::Entity::delete_many()
        .filter(book_author::Column::BookId.eq(key))
        .exec(txn)
        .await?;
    for (position, author_id) in author_ids.into_iter().enumerate() {
        book_author::ActiveModel {
            book_id: Set(key),
            author_id: Set(author_id),
            position: Set(position as i32),
        }
        .insert(txn)
        .await?;
    }
    Ok(())
}

async fn upsert_categories<C: ConnectionTrait>(
    txn: &C,
    key: Uuid,
    incoming: &Book,
) -> HydrateResult<()> {
    let now = Utc::now();
    for name in &incoming.categories {
        let normalized = slugify(name);
        if normalized.is_empty() {
            continue;
        }
        let existing = collection::Entity::find()
            .filter(collection::Column::CollectionType.eq("CATEGORY"))
            .filter(collection::Column::NormalizedName.eq(&normalized))
            .one(txn)
            .await?;
        let collection_id = match existing {
            Some(model) => model.id,
            None => {
                let id = keys::short_id();
                collection::ActiveModel {
                    id: Set(id.clone()),
                    collection_type: Set("CATEGORY".into()),
                    source: Set(None),
                    display_name: Set(name.clone()),
                    normalized_name: Set(normalized),
                    list_code: Set(None),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;
                id
            }
        };
        let membership = book_collection::Entity::find_by_id((collection_id.clone(), key))
            .one(txn)
            .await?;
        if membership.is_none() {
            book_collection::ActiveModel {
                collection_id: Set(collection_id),
                book_id: Set(key),
                rank: Set(None),
                weeks_on_list: Set(None),
                created_at: Set(now),
            }
            .insert(txn)
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_prefers_canonical_then_isbn() {
        let mut book = Book::with_title("T");
        assert!(identity_lock_key(&book).starts_with("title:"));
        book.external_id = Some("vol1".into());
        book.source = Some(ProviderSource::GoogleBooks);
        assert_eq!(identity_lock_key(&book), "ext:GOOGLE_BOOKS:vol1");
        book.isbn10 = Some("0307743659".into());
        assert_eq!(identity_lock_key(&book), "isbn10:0307743659");
        book.isbn13 = Some("9780307743657".into());
        assert_eq!(identity_lock_key(&book), "isbn13:9780307743657");
        book.id = Some(Uuid::nil());
        assert_eq!(identity_lock_key(&book), Uuid::nil().to_string());
    }

    #[test]
    fn external_source_resolves_aggregates_to_strongest_contributor() {
        let mut book = Book::with_title("T");
        book.source = Some(ProviderSource::Aggregated);
        book.contributing_sources =
            vec![ProviderSource::Nyt, ProviderSource::OpenLibrary];
        assert_eq!(external_source(&book), Some(ProviderSource::OpenLibrary));
        book.source = Some(ProviderSource::GoogleBooks);
        assert_eq!(external_source(&book), Some(ProviderSource::GoogleBooks));
    }
}
