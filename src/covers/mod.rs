//! Cover orchestration: a synchronous resolution path over in-memory caches
//! and stored fields, plus the asynchronous selection pipeline that probes
//! the object store and the providers, rejects placeholders, and commits
//! monotonically improving cover state.

pub mod processing;
pub mod provenance;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{Book, CoverSource, CoverState, ProviderSource};
use crate::error::HydrateResult;
use crate::object_store::{ObjectStore, cover_key};
use crate::parser::openlibrary;
use crate::providers::LongitoodClient;
use crate::resilience::ProviderGuard;
use crate::store::CanonicalStore;
use processing::{ImageVerdict, ProcessedImage};
use provenance::{AttemptStatus, CoverAttempt, CoverProvenance};

const PLACEHOLDER_URL: &str = "/images/placeholder-book-cover.svg";
const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);
const FINAL_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const PROVISIONAL_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const CACHE_CAPACITY: u64 = 10_000;

/// Emitted on the provisional -> final transition (and on later monotone
/// improvements).
#[derive(Debug, Clone)]
pub struct CoverUpdated {
    pub book_id: Uuid,
    pub cover: CoverState,
}

pub struct CoverOrchestrator {
    store: Arc<CanonicalStore>,
    objects: Option<Arc<dyn ObjectStore>>,
    longitood: LongitoodClient,
    longitood_guard: Arc<ProviderGuard>,
    http: reqwest::Client,
    final_cache: Cache<Uuid, CoverState>,
    provisional_cache: Cache<Uuid, CoverState>,
    in_flight: Mutex<HashSet<Uuid>>,
    events: broadcast::Sender<CoverUpdated>,
    cdn_url: Option<String>,
}

impl CoverOrchestrator {
    pub fn new(
        store: Arc<CanonicalStore>,
        objects: Option<Arc<dyn ObjectStore>>,
        longitood: LongitoodClient,
        longitood_guard: Arc<ProviderGuard>,
        cdn_url: Option<String>,
    ) -> HydrateResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| crate::error::HydrateError::Transient(format!("building client: {e}")))?;
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            store,
            objects,
            longitood,
            longitood_guard,
            http,
            final_cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(FINAL_CACHE_TTL)
                .build(),
            provisional_cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(PROVISIONAL_CACHE_TTL)
                .build(),
            in_flight: Mutex::new(HashSet::new()),
            events,
            cdn_url,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoverUpdated> {
        self.events.subscribe()
    }

    /// Synchronous resolution: final cache, provisional cache, stored book
    /// fields, placeholder. Never touches the network.
    pub async fn resolve(&self, book: &Book) -> CoverState {
        if let Some(key) = book.id {
            if let Some(cover) = self.final_cache.get(&key).await {
                return cover;
            }
            if let Some(cover) = self.provisional_cache.get(&key).await {
                return cover;
            }
        }
        if let Some(cover) = cover_from_stored(book) {
            if let Some(key) = book.id {
                self.provisional_cache.insert(key, cover.clone()).await;
            }
            return cover;
        }
        placeholder_cover()
    }

    /// Kick the async selection pipeline for `book`. At most one refresh per
    /// key is in flight; duplicate triggers coalesce.
    pub fn schedule_refresh(self: &Arc<Self>, book: &Book) {
        let Some(key) = book.id else {
            return;
        };
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(key) {
                return;
            }
        }
        let this = Arc::clone(self);
        let book = book.clone();
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(REFRESH_TIMEOUT, this.refresh(&book)).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(book_id = %key, error = %err, "cover refresh failed")
                }
                Err(_) => tracing::warn!(book_id = %key, "cover refresh timed out"),
            }
            this.in_flight.lock().remove(&key);
        });
    }

    async fn refresh(&self, book: &Book) -> HydrateResult<()> {
        let key = match book.id {
            Some(key) => key,
            None => return Ok(()),
        };
        let mut provenance = CoverProvenance::default();

        // cached original in the object store wins outright when it is
        // already high-resolution
        if let Some(candidate) = self.probe_object_store(book, &mut provenance).await {
            if candidate.processed.is_high_resolution() {
                provenance.select(
                    "high-resolution object-store original",
                    candidate.storage_key.clone(),
                );
                return self.commit(key, candidate, provenance).await;
            }
        }

        let mut urls = provider_candidates(book);
        if book.isbn13.is_some() || book.isbn10.is_some() {
            if let Some(url) = self.longitood_candidate(book).await {
                urls.push((CoverSource::Longitood, url));
            }
        } else {
            provenance.record(CoverAttempt {
                source: CoverSource::Longitood,
                url: String::new(),
                status: AttemptStatus::SkippedNoIsbn,
                width: None,
                height: None,
                reason: None,
            });
        }

        let mut candidates = Vec::new();
        for (source, url) in urls {
            match self.try_candidate(source, &url, &mut provenance).await {
                Some((processed, bytes)) => candidates.push(Candidate {
                    source,
                    url,
                    processed,
                    bytes,
                    storage_key: None,
                }),
                None => continue,
            }
        }

        let Some(mut best) = pick_best(candidates) else {
            tracing::debug!(book_id = %key, "no acceptable cover candidate");
            self.store
                .attach_cover_provenance(key, provenance.to_json())
                .await?;
            return Ok(());
        };

        best.storage_key = self.upload(book, &best).await;
        provenance.select(
            format!(
                "{} candidate {}x{}{}",
                best.source.as_str(),
                best.processed.width,
                best.processed.height,
                if best.processed.is_high_resolution() {
                    " (high-res)"
                } else {
                    ""
                }
            ),
            best.storage_key.clone(),
        );
        self.commit(key, best, provenance).await
    }

    async fn probe_object_store(
        &self,
        book: &Book,
        provenance: &mut CoverProvenance,
    ) -> Option<Candidate> {
        let objects = self.objects.as_ref()?;
        let external_id = book.external_id.as_deref()?;
        let storage_key = cover_key(external_id);
        match objects.get(&storage_key).await {
            Ok(Some(bytes)) => match processing::inspect(&bytes) {
                ImageVerdict::Accepted(processed) => {
                    provenance.record(CoverAttempt {
                        source: CoverSource::S3Cache,
                        url: storage_key.clone(),
                        status: AttemptStatus::Success,
                        width: Some(processed.width),
                        height: Some(processed.height),
                        reason: None,
                    });
                    Some(Candidate {
                        source: CoverSource::S3Cache,
                        url: self.public_url(&storage_key),
                        processed,
                        bytes,
                        storage_key: Some(storage_key),
                    })
                }
                verdict => {
                    provenance.record(CoverAttempt {
                        source: CoverSource::S3Cache,
                        url: storage_key,
                        status: AttemptStatus::FailureProcessing,
                        width: None,
                        height: None,
                        reason: Some(format!("{verdict:?}")),
                    });
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::debug!(error = %err, "object-store cover probe failed");
                None
            }
        }
    }

    async fn try_candidate(
        &self,
        source: CoverSource,
        url: &str,
        provenance: &mut CoverProvenance,
    ) -> Option<(ProcessedImage, Vec<u8>)> {
        if !url.starts_with("http") {
            provenance.record(CoverAttempt {
                source,
                url: url.to_string(),
                status: AttemptStatus::SkippedBadUrl,
                width: None,
                height: None,
                reason: None,
            });
            return None;
        }
        let bytes = match self.fetch_image(url).await {
            Ok(bytes) => bytes,
            Err(status) => {
                provenance.record(CoverAttempt {
                    source,
                    url: url.to_string(),
                    status,
                    width: None,
                    height: None,
                    reason: None,
                });
                return None;
            }
        };
        match processing::inspect(&bytes) {
            ImageVerdict::Accepted(processed) => {
                provenance.record(CoverAttempt {
                    source,
                    url: url.to_string(),
                    status: AttemptStatus::Success,
                    width: Some(processed.width),
                    height: Some(processed.height),
                    reason: None,
                });
                Some((processed, bytes))
            }
            ImageVerdict::Placeholder(reason) => {
                provenance.record(CoverAttempt {
                    source,
                    url: url.to_string(),
                    status: AttemptStatus::FailurePlaceholderDetected,
                    width: None,
                    height: None,
                    reason: Some(reason),
                });
                None
            }
            ImageVerdict::Undecodable => {
                provenance.record(CoverAttempt {
                    source,
                    url: url.to_string(),
                    status: AttemptStatus::FailureProcessing,
                    width: None,
                    height: None,
                    reason: Some("undecodable".into()),
                });
                None
            }
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, AttemptStatus> {
        let response = self.http.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                AttemptStatus::FailureTimeout
            } else {
                AttemptStatus::FailureProcessing
            }
        })?;
        match response.status().as_u16() {
            200 => response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|_| AttemptStatus::FailureProcessing),
            404 => Err(AttemptStatus::Failure404),
            _ => Err(AttemptStatus::FailureProcessing),
        }
    }

    /// Resolve the Longitood cover URL for a book; guarded like every other
    /// provider call.
    pub async fn longitood_candidate(&self, book: &Book) -> Option<String> {
        let isbn = book.isbn13.as_deref().or(book.isbn10.as_deref())?;
        let isbn = isbn.to_string();
        let longitood = self.longitood.clone();
        self.longitood_guard
            .call(move || {
                let longitood = longitood.clone();
                let isbn = isbn.clone();
                async move { longitood.cover_url(&isbn).await }
            })
            .await
            .ok()
            .flatten()
    }

    async fn upload(&self, book: &Book, candidate: &Candidate) -> Option<String> {
        let objects = self.objects.as_ref()?;
        let external_id = book.external_id.as_deref()?;
        let storage_key = cover_key(external_id);
        match objects
            .put(&storage_key, candidate.bytes.clone(), "image/jpeg")
            .await
        {
            Ok(()) => Some(storage_key),
            Err(err) => {
                tracing::warn!(error = %err, "cover upload failed");
                None
            }
        }
    }

    async fn commit(
        &self,
        key: Uuid,
        candidate: Candidate,
        provenance: CoverProvenance,
    ) -> HydrateResult<()> {
        let new_state = CoverState {
            preferred_url: Some(
                candidate
                    .storage_key
                    .as_deref()
                    .map(|sk| self.public_url(sk))
                    .unwrap_or_else(|| candidate.url.clone()),
            ),
            fallback_url: Some(candidate.url.clone()),
            source: candidate.source,
            width: Some(candidate.processed.width as i32),
            height: Some(candidate.processed.height as i32),
            high_resolution: candidate.processed.is_high_resolution(),
            storage_key: candidate.storage_key.clone(),
        };

        // monotone: a final state is only ever replaced by a better one; on
        // a cold cache the stored row is the state of record
        let current = match self.final_cache.get(&key).await {
            Some(current) => Some(current),
            None => self
                .store
                .fetch_by_key(key)
                .await
                .ok()
                .map(|book| book.cover),
        };
        if let Some(current) = current {
            if current.preferred_url.is_some() && !improves(&current, &new_state) {
                tracing::debug!(book_id = %key, "cover candidate does not improve final state");
                return Ok(());
            }
        }

        self.store.set_cover_state(key, &new_state).await?;
        self.store
            .attach_cover_provenance(key, provenance.to_json())
            .await?;
        self.final_cache.insert(key, new_state.clone()).await;
        self.provisional_cache.remove(&key).await;
        let _ = self.events.send(CoverUpdated {
            book_id: key,
            cover: new_state,
        });
        Ok(())
    }

    fn public_url(&self, storage_key: &str) -> String {
        match &self.cdn_url {
            Some(cdn) => format!("{}/{}", cdn.trim_end_matches('/'), storage_key),
            None => storage_key.to_string(),
        }
    }
}

struct Candidate {
    source: CoverSource,
    url: String,
    processed: ProcessedImage,
    bytes: Vec<u8>,
    storage_key: Option<String>,
}

pub fn placeholder_cover() -> CoverState {
    CoverState {
        preferred_url: Some(PLACEHOLDER_URL.to_string()),
        fallback_url: None,
        source: CoverSource::None,
        width: None,
        height: None,
        high_resolution: false,
        storage_key: None,
    }
}

/// Cover state derivable synchronously from a book's stored fields.
fn cover_from_stored(book: &Book) -> Option<CoverState> {
    if book.cover.preferred_url.is_some() {
        return Some(book.cover.clone());
    }
    let url = book.best_image_link()?;
    Some(CoverState {
        preferred_url: Some(url.to_string()),
        fallback_url: None,
        source: match book.source {
            Some(ProviderSource::OpenLibrary) => CoverSource::OpenLibrary,
            Some(ProviderSource::GoogleBooks) => CoverSource::GoogleBooks,
            _ => CoverSource::Undefined,
        },
        width: book.cover.width,
        height: book.cover.height,
        high_resolution: false,
        storage_key: None,
    })
}

/// Candidate (source, URL) pairs in preference order.
fn provider_candidates(book: &Book) -> Vec<(CoverSource, String)> {
    let mut candidates = Vec::new();
    if let Some(url) = book.best_image_link() {
        let source = match book.source {
            Some(ProviderSource::OpenLibrary) => CoverSource::OpenLibrary,
            _ => CoverSource::GoogleBooks,
        };
        candidates.push((source, url.to_string()));
    }
    if let Some(isbn) = book.isbn13.as_deref().or(book.isbn10.as_deref()) {
        candidates.push((
            CoverSource::OpenLibrary,
            openlibrary::cover_url_for_isbn(isbn),
        ));
    }
    candidates
}

fn source_rank(source: CoverSource) -> u8 {
    match source {
        CoverSource::S3Cache => 0,
        CoverSource::GoogleBooks => 1,
        CoverSource::OpenLibrary => 2,
        CoverSource::Longitood => 3,
        CoverSource::LocalCache => 4,
        _ => 5,
    }
}

/// Best candidate: high-res first, then preferred-source order, then larger
/// area.
fn pick_best(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().min_by(|a, b| {
        b.processed
            .is_high_resolution()
            .cmp(&a.processed.is_high_resolution())
            .then(source_rank(a.source).cmp(&source_rank(b.source)))
            .then(b.processed.area().cmp(&a.processed.area()))
    })
}

/// Monotone improvement: never downgrade the high-resolution flag; same flag
/// needs strictly more pixels.
fn improves(current: &CoverState, candidate: &CoverState) -> bool {
    if current.preferred_url.is_none() {
        return true;
    }
    if current.high_resolution != candidate.high_resolution {
        return candidate.high_resolution;
    }
    let area = |state: &CoverState| {
        state.width.unwrap_or(0) as i64 * state.height.unwrap_or(0) as i64
    };
    area(candidate) > area(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: CoverSource, width: u32, height: u32) -> Candidate {
        Candidate {
            source,
            url: format!("http://covers/{}", source.as_str()),
            processed: ProcessedImage { width, height },
            bytes: Vec::new(),
            storage_key: None,
        }
    }

    #[test]
    fn high_res_beats_source_order() {
        let best = pick_best(vec![
            candidate(CoverSource::GoogleBooks, 400, 600),
            candidate(CoverSource::OpenLibrary, 900, 1400),
        ])
        .unwrap();
        assert_eq!(best.source, CoverSource::OpenLibrary);
    }

    #[test]
    fn source_order_breaks_high_res_ties() {
        let best = pick_best(vec![
            candidate(CoverSource::OpenLibrary, 900, 1400),
            candidate(CoverSource::GoogleBooks, 850, 1300),
        ])
        .unwrap();
        assert_eq!(best.source, CoverSource::GoogleBooks);
    }

    #[test]
    fn area_breaks_remaining_ties() {
        let best = pick_best(vec![
            candidate(CoverSource::OpenLibrary, 300, 450),
            candidate(CoverSource::OpenLibrary, 500, 750),
        ])
        .unwrap();
        assert_eq!(best.processed.width, 500);
    }

    #[test]
    fn improvement_is_monotone() {
        let final_state = CoverState {
            preferred_url: Some("a".into()),
            high_resolution: true,
            width: Some(900),
            height: Some(1400),
            ..CoverState::default()
        };
        let smaller_high_res = CoverState {
            preferred_url: Some("b".into()),
            high_resolution: true,
            width: Some(850),
            height: Some(1300),
            ..CoverState::default()
        };
        let low_res = CoverState {
            preferred_url: Some("c".into()),
            high_resolution: false,
            width: Some(4000),
            height: Some(6000),
            ..CoverState::default()
        };
        assert!(!improves(&final_state, &smaller_high_res));
        assert!(!improves(&final_state, &low_res));
        let bigger = CoverState {
            width: Some(1000),
            height: Some(1500),
            high_resolution: true,
            preferred_url: Some("d".into()),
            ..CoverState::default()
        };
        assert!(improves(&final_state, &bigger));
        assert!(improves(&CoverState::default(), &low_res));
    }

    #[test]
    fn stored_fields_become_provisional_state() {
        let mut book = Book::with_title("T");
        book.source = Some(ProviderSource::OpenLibrary);
        book.image_links
            .insert("large".into(), "http://ol/cover.jpg".into());
        let cover = cover_from_stored(&book).unwrap();
        assert_eq!(cover.source, CoverSource::OpenLibrary);
        assert_eq!(cover.preferred_url.as_deref(), Some("http://ol/cover.jpg"));
        assert!(cover_from_stored(&Book::with_title("x")).is_none());
    }

    #[test]
    fn placeholder_has_none_source() {
        let cover = placeholder_cover();
        assert_eq!(cover.source, CoverSource::None);
        assert!(cover.preferred_url.is_some());
    }
}
