//! The fetch precedence ladder: canonical store, object-store payload cache,
//! external providers. Tier failures are swallowed and logged; the aggregate
//! outcome of a full-chain miss is `NotFound`, never a provider error.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::aggregate;
use crate::covers::CoverOrchestrator;
use crate::domain::isbn;
use crate::domain::models::{Book, ProviderSource};
use crate::error::{HydrateError, HydrateResult};
use crate::identity;
use crate::object_store::cache::PayloadCache;
use crate::parser::{self, canonical};
use crate::providers::{Providers, google_books};
use crate::store::search::{self, AuthorHit};
use crate::store::CanonicalStore;

/// Budget for one full tiered resolution.
const RESOLUTION_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_SEARCH_LIMIT: u32 = 20;

pub struct TieredResolver {
    store: Arc<CanonicalStore>,
    cache: Option<Arc<PayloadCache>>,
    providers: Arc<Providers>,
    covers: Arc<CoverOrchestrator>,
}

impl TieredResolver {
    pub fn new(
        store: Arc<CanonicalStore>,
        cache: Option<Arc<PayloadCache>>,
        providers: Arc<Providers>,
        covers: Arc<CoverOrchestrator>,
    ) -> Self {
        Self {
            store,
            cache,
            providers,
            covers,
        }
    }

    /// Resolve any identifier to a fully hydrated book, consulting the tiers
    /// in precedence order.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn fetch_by_id(&self, identifier: &str) -> HydrateResult<Book> {
        match tokio::time::timeout(RESOLUTION_TIMEOUT, self.fetch_by_id_inner(identifier)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(identifier, "tiered resolution timed out");
                Err(HydrateError::NotFound)
            }
        }
    }

    async fn fetch_by_id_inner(&self, identifier: &str) -> HydrateResult<Book> {
        // tier 1: canonical store
        match identity::resolve(self.store.connection(), identifier).await {
            Ok(key) => match self.store.fetch_by_key(key).await {
                Ok(book) => return Ok(book),
                Err(HydrateError::NotFound) => {}
                Err(err) => tracing::warn!(identifier, error = %err, "store tier failed"),
            },
            Err(HydrateError::NotFound) => {}
            Err(err) => tracing::warn!(identifier, error = %err, "identity tier failed"),
        }

        // tier 2: object-store payload cache, keyed by external id
        if let Some(cache) = &self.cache {
            match cache.fetch(identifier).await {
                Ok(Some(payload)) => {
                    match self.persist_payload(identifier, &payload).await {
                        Ok(book) => return Ok(book),
                        Err(err) => {
                            tracing::warn!(identifier, error = %err, "cache tier failed")
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(identifier, error = %err, "cache tier failed"),
            }
        }

        // tier 3: external providers
        match self.fetch_from_providers(identifier).await {
            Ok(book) => Ok(book),
            Err(HydrateError::NotFound) => Err(HydrateError::NotFound),
            Err(err) => {
                tracing::warn!(identifier, error = %err, "provider tier failed");
                Err(HydrateError::NotFound)
            }
        }
    }

    /// Parse a cached payload, persist it, and return the hydrated book.
    async fn persist_payload(&self, identifier: &str, payload: &str) -> HydrateResult<Book> {
        let books = parser::parse_payload(ProviderSource::GoogleBooks, payload)?;
        let book = books.into_iter().next().ok_or(HydrateError::NotFound)?;
        let key = self
            .store
            .upsert(
                &book,
                &[(
                    book.source.unwrap_or(ProviderSource::GoogleBooks),
                    payload.to_string(),
                )],
            )
            .await?;
        let hydrated = self.store.fetch_by_key(key).await?;
        self.covers.schedule_refresh(&hydrated);
        Ok(hydrated)
    }

    async fn fetch_from_providers(&self, identifier: &str) -> HydrateResult<Book> {
        let is_isbn = isbn::classify(identifier).is_some();
        let mut parsed: BTreeMap<ProviderSource, Book> = BTreeMap::new();
        let mut raw_payloads: Vec<(ProviderSource, String)> = Vec::new();

        // GoogleBooks, falling back to the unauthenticated variant when the
        // authenticated one is throttled
        let google_result = self.google_fetch(identifier, is_isbn).await;
        match google_result {
            Ok(body) => {
                if let Some(book) = first_parsed(ProviderSource::GoogleBooks, &body) {
                    parsed.insert(ProviderSource::GoogleBooks, book);
                    raw_payloads.push((ProviderSource::GoogleBooks, body));
                }
            }
            Err(err) => tracing::debug!(identifier, error = %err, "GOOGLE_BOOKS miss"),
        }

        // OpenLibrary resolves ISBNs only
        if is_isbn {
            let guard = self.providers.guard("OPEN_LIBRARY");
            let client = &self.providers.open_library;
            let sanitized = isbn::sanitize(identifier);
            match guard.call(|| client.fetch_by_isbn(&sanitized)).await {
                Ok(body) => {
                    if let Some(book) = first_parsed(ProviderSource::OpenLibrary, &body) {
                        parsed.insert(ProviderSource::OpenLibrary, book);
                        raw_payloads.push((ProviderSource::OpenLibrary, body));
                    }
                }
                Err(err) => tracing::debug!(identifier, error = %err, "OPEN_LIBRARY miss"),
            }
        }

        if parsed.is_empty() {
            return Err(HydrateError::NotFound);
        }

        let multi_source = parsed.len() > 1;
        let book = aggregate::aggregate(parsed, identifier);
        let canonical_payload = serde_json::to_string(&canonical::to_canonical_json(&book))?;
        if multi_source {
            raw_payloads.push((ProviderSource::Aggregated, canonical_payload.clone()));
        }

        let key = self.store.upsert(&book, &raw_payloads).await?;

        // refresh the object cache under the provider's external id
        if let (Some(cache), Some(external_id)) = (&self.cache, &book.external_id) {
            if let Err(err) = cache.update(external_id, &book).await {
                tracing::warn!(external_id, error = %err, "payload cache update failed");
            }
        }

        let hydrated = self.store.fetch_by_key(key).await?;
        self.covers.schedule_refresh(&hydrated);
        Ok(hydrated)
    }

    async fn google_fetch(&self, identifier: &str, is_isbn: bool) -> HydrateResult<String> {
        let guard = self.providers.guard(google_books::PROVIDER);
        let client = &self.providers.google_books;
        let sanitized = isbn::sanitize(identifier);
        let result = guard
            .call(|| async {
                if is_isbn {
                    client.fetch_by_isbn(&sanitized).await
                } else {
                    client.fetch_by_id(identifier).await
                }
            })
            .await;
        match result {
            Err(ref err) if err.is_rate_limit() && client.is_authenticated() => {
                tracing::info!(identifier, "falling back to unauthenticated GoogleBooks");
                let fallback = &self.providers.google_books_unauthenticated;
                guard
                    .call(|| async {
                        if is_isbn {
                            fallback.fetch_by_isbn(&sanitized).await
                        } else {
                            fallback.fetch_by_id(identifier).await
                        }
                    })
                    .await
            }
            other => other,
        }
    }

    /// Full-text search over the canonical store first; provider search only
    /// when the database has nothing. Provider results are persisted as a
    /// fire-and-forget side effect.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn search_books(&self, query: &str, limit: Option<u32>) -> HydrateResult<Vec<Book>> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, 100);
        let (free_text, qualifiers) = parser::extract_query_qualifiers(query);

        // tier 1: database full-text function
        match search::search_books(self.store.connection(), &free_text, limit).await {
            Ok(hits) if !hits.is_empty() => {
                let mut books = Vec::with_capacity(hits.len());
                for hit in hits {
                    match self.store.fetch_by_key(hit.book_id).await {
                        Ok(book) => books.push(book),
                        Err(err) => {
                            tracing::debug!(book_id = %hit.book_id, error = %err, "hit vanished")
                        }
                    }
                }
                return Ok(books);
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "database search failed"),
        }

        // tier 2: GoogleBooks (authenticated, then unauthenticated), then
        // OpenLibrary
        let composed = google_books::compose_query(&free_text, &qualifiers);
        let mut books = self.google_search(&composed, limit as usize).await;
        if books.is_empty() {
            let guard = self.providers.guard("OPEN_LIBRARY");
            let client = &self.providers.open_library;
            match guard
                .call(|| client.search_by_title(&free_text, limit))
                .await
            {
                Ok(body) => {
                    books = parser::parse_payload(ProviderSource::OpenLibrary, &body)
                        .unwrap_or_default();
                }
                Err(err) => tracing::debug!(error = %err, "OPEN_LIBRARY search miss"),
            }
        }

        let mut books = parser::dedup_books(books);
        books.truncate(limit as usize);
        for book in &mut books {
            for (key, value) in &qualifiers {
                book.qualifiers.insert(key.clone(), value.clone());
            }
        }

        // persistence is a side effect; the search path never waits on it
        for book in &books {
            let store = Arc::clone(&self.store);
            let book = book.clone();
            tokio::spawn(async move {
                let payload =
                    serde_json::to_string(&canonical::to_canonical_json(&book)).unwrap_or_default();
                let source = book.source.unwrap_or(ProviderSource::GoogleBooks);
                if let Err(err) = store.upsert(&book, &[(source, payload)]).await {
                    tracing::debug!(title = %book.title, error = %err, "search persist failed");
                }
            });
        }

        Ok(books)
    }

    /// Drain the lazy GoogleBooks search stream up to `limit` items. The
    /// guard gates the whole operation; a failure with results already in
    /// hand keeps the partial page set.
    async fn google_search(&self, query: &str, limit: usize) -> Vec<Book> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let guard = self.providers.guard(google_books::PROVIDER);
        let authed = &self.providers.google_books;
        match guard.call(|| drain_search(authed, query, limit)).await {
            Ok(books) => books,
            Err(err) => {
                tracing::debug!(error = %err, "authenticated GoogleBooks search miss");
                if err.is_rate_limit() && authed.is_authenticated() {
                    let fallback = &self.providers.google_books_unauthenticated;
                    guard
                        .call(|| drain_search(fallback, query, limit))
                        .await
                        .unwrap_or_default()
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Author search is delegated entirely to the database function.
    pub async fn search_authors(&self, query: &str, limit: u32) -> HydrateResult<Vec<AuthorHit>> {
        search::search_authors(self.store.connection(), query, limit).await
    }

    pub fn store(&self) -> &Arc<CanonicalStore> {
        &self.store
    }

    pub fn covers(&self) -> &Arc<CoverOrchestrator> {
        &self.covers
    }
}

/// Pull up to `limit` items from the paged search stream. An error before
/// the first item surfaces (it may be a rate limit the caller reacts to);
/// a later error just ends the sequence early.
async fn drain_search(
    client: &crate::providers::GoogleBooksClient,
    query: &str,
    limit: usize,
) -> HydrateResult<Vec<Book>> {
    use futures_util::StreamExt;

    let stream = client.search_stream(query.to_string(), limit);
    futures_util::pin_mut!(stream);
    let mut books = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(book) => books.push(book),
            Err(err) if books.is_empty() => return Err(err),
            Err(err) => {
                tracing::debug!(error = %err, "search stream ended early");
                break;
            }
        }
    }
    Ok(books)
}

fn first_parsed(source: ProviderSource, body: &str) -> Option<Book> {
    match parser::parse_payload(source, body) {
        Ok(books) => books.into_iter().next(),
        Err(err) => {
            tracing::debug!(%source, error = %err, "payload unparseable");
            None
        }
    }
}

/// Convenience used by scheduler jobs: resolve by ISBN specifically.
impl TieredResolver {
    pub async fn fetch_by_isbn(&self, raw: &str) -> HydrateResult<Book> {
        let sanitized = isbn::sanitize(raw);
        if sanitized.is_empty() {
            return Err(HydrateError::NotFound);
        }
        self.fetch_by_id(&sanitized).await
    }

    /// Resolve an identifier to a canonical key without hydrating.
    pub async fn resolve_key(&self, identifier: &str) -> HydrateResult<Uuid> {
        identity::resolve(self.store.connection(), identifier).await
    }
}
