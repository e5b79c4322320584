//! Periodic maintenance: cache warming, NYT bestseller ingestion, sitemap
//! snapshots, and the search-index refresh that follows batch writes. Jobs
//! run on cron triggers; concurrent runs of the same job are suppressed by a
//! per-job mutex.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{JobsConfig, SitemapConfig};
use crate::domain::models::Book;
use crate::error::HydrateResult;
use crate::object_store::ObjectStore;
use crate::parser::nyt as nyt_parser;
use crate::providers::Providers;
use crate::recommend::RecommendationEngine;
use crate::store::CanonicalStore;
use crate::store::search;
use crate::tiered::TieredResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    CacheWarming,
    BestsellerIngestion,
    SitemapSnapshot,
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::CacheWarming => "cache-warming",
            Job::BestsellerIngestion => "bestseller-ingestion",
            Job::SitemapSnapshot => "sitemap-snapshot",
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            Job::CacheWarming => Duration::from_secs(30 * 60),
            Job::BestsellerIngestion => Duration::from_secs(20 * 60),
            Job::SitemapSnapshot => Duration::from_secs(5 * 60),
        }
    }
}

/// How many recently touched books one warming pass refreshes.
const WARMING_BATCH: u64 = 200;

pub struct Scheduler {
    resolver: Arc<TieredResolver>,
    store: Arc<CanonicalStore>,
    providers: Arc<Providers>,
    objects: Option<Arc<dyn ObjectStore>>,
    recommendations: Arc<RecommendationEngine>,
    sitemap: SitemapConfig,
    jobs: JobsConfig,
    locks: HashMap<Job, Arc<Mutex<()>>>,
}

impl Scheduler {
    pub fn new(
        resolver: Arc<TieredResolver>,
        store: Arc<CanonicalStore>,
        providers: Arc<Providers>,
        objects: Option<Arc<dyn ObjectStore>>,
        recommendations: Arc<RecommendationEngine>,
        sitemap: SitemapConfig,
        jobs: JobsConfig,
    ) -> Self {
        let locks = [Job::CacheWarming, Job::BestsellerIngestion, Job::SitemapSnapshot]
            .into_iter()
            .map(|job| (job, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            resolver,
            store,
            providers,
            objects,
            recommendations,
            sitemap,
            jobs,
            locks,
        }
    }

    /// Spawn one trigger loop per enabled job.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        let mut triggers = vec![
            (Job::CacheWarming, self.jobs.cache_warming_cron.clone()),
            (Job::BestsellerIngestion, self.jobs.nyt_cron.clone()),
        ];
        if self.sitemap.enabled {
            triggers.push((Job::SitemapSnapshot, self.sitemap.cron.clone()));
        }
        for (job, expression) in triggers {
            let this = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                this.trigger_loop(job, &expression).await;
            }));
        }
        handles
    }

    async fn trigger_loop(&self, job: Job, expression: &str) {
        let schedule = match Schedule::from_str(expression) {
            Ok(schedule) => schedule,
            Err(err) => {
                tracing::error!(job = job.name(), expression, %err, "invalid cron expression");
                return;
            }
        };
        tracing::info!(job = job.name(), expression, "scheduler loop started");
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                tracing::warn!(job = job.name(), "cron schedule has no upcoming firings");
                return;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            self.run_job(job).await;
        }
    }

    /// Run one job now, unless the same job is already running.
    pub async fn run_job(&self, job: Job) {
        let lock = Arc::clone(&self.locks[&job]);
        let Ok(_guard) = lock.try_lock() else {
            tracing::warn!(job = job.name(), "previous run still active, suppressed");
            return;
        };
        tracing::info!(job = job.name(), "job started");
        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(job.timeout(), async {
            match job {
                Job::CacheWarming => self.run_cache_warming().await,
                Job::BestsellerIngestion => self.run_bestseller_ingestion().await,
                Job::SitemapSnapshot => self.run_sitemap_snapshot().await,
            }
        })
        .await;
        match outcome {
            Ok(Ok(())) => tracing::info!(
                job = job.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "job finished"
            ),
            Ok(Err(err)) => tracing::error!(job = job.name(), error = %err, "job failed"),
            Err(_) => tracing::error!(job = job.name(), "job timed out"),
        }
    }

    /// Re-resolve recently touched books so caches stay warm. Provider rate
    /// limits are enforced by the guards inside the resolver.
    async fn run_cache_warming(&self) -> HydrateResult<()> {
        let keys = self.store.recently_updated_keys(WARMING_BATCH).await?;
        let total = keys.len();
        let mut refreshed = 0usize;
        for key in keys {
            match self.resolver.fetch_by_id(&key.to_string()).await {
                Ok(book) => {
                    refreshed += 1;
                    match self.recommendations.recommend(&book, None).await {
                        Ok(similar) => self.recommendations.persist_detached(key, similar),
                        Err(err) => {
                            tracing::debug!(book_id = %key, error = %err, "recommend failed")
                        }
                    }
                }
                Err(err) => tracing::debug!(book_id = %key, error = %err, "warming miss"),
            }
        }
        tracing::info!(refreshed, total, "cache warming pass done");
        search::refresh_search_view(self.store.connection()).await
    }

    /// Pull the NYT overview, hydrate every entry through the resolver, and
    /// record list memberships with rank and weeks-on-list.
    async fn run_bestseller_ingestion(&self) -> HydrateResult<()> {
        if !self.providers.nyt.is_configured() {
            tracing::info!("NYT credentials absent, skipping bestseller ingestion");
            return Ok(());
        }
        let guard = self.providers.guard("NYT");
        let client = &self.providers.nyt;
        let body = guard.call(|| client.fetch_overview()).await?;
        let value: serde_json::Value = serde_json::from_str(&body)?;
        let lists = nyt_parser::parse_overview_value(&value)?;

        let mut ingested = 0usize;
        for list in &lists {
            for entry in &list.books {
                match self.ingest_bestseller(entry, &list.list_code, &list.display_name).await {
                    Ok(()) => ingested += 1,
                    Err(err) => {
                        tracing::warn!(title = %entry.title, error = %err, "bestseller skipped")
                    }
                }
            }
        }
        tracing::info!(lists = lists.len(), ingested, "bestseller ingestion done");
        search::refresh_search_view(self.store.connection()).await
    }

    async fn ingest_bestseller(
        &self,
        entry: &Book,
        list_code: &str,
        display_name: &str,
    ) -> HydrateResult<()> {
        let isbn = entry
            .isbn13
            .as_deref()
            .or(entry.isbn10.as_deref())
            .ok_or(crate::error::HydrateError::NotFound)?;
        let hydrated = match self.resolver.fetch_by_isbn(isbn).await {
            Ok(book) => book,
            // providers may not know a brand-new list entry yet; persist the
            // NYT record itself so the membership has a book to point at
            Err(crate::error::HydrateError::NotFound) => {
                let key = self.store.upsert(entry, &[]).await?;
                self.store.fetch_by_key(key).await?
            }
            Err(err) => return Err(err),
        };
        let key = hydrated.id.ok_or(crate::error::HydrateError::NotFound)?;
        let (rank, weeks) = entry
            .qualifiers
            .get("nytBestseller")
            .map(|q| {
                (
                    q.get("rank").and_then(|v| v.as_i64()).map(|v| v as i32),
                    q.get("weeksOnList").and_then(|v| v.as_i64()).map(|v| v as i32),
                )
            })
            .unwrap_or((None, None));
        self.store
            .upsert_bestseller_membership(key, list_code, display_name, rank, weeks)
            .await
    }

    /// Emit the (slug, updated_at) snapshot to the object store.
    async fn run_sitemap_snapshot(&self) -> HydrateResult<()> {
        let Some(objects) = &self.objects else {
            tracing::info!("object store absent, skipping sitemap snapshot");
            return Ok(());
        };
        let snapshot = self.store.slug_snapshot().await?;
        let payload = serde_json::json!({
            "generatedAt": Utc::now(),
            "count": snapshot.len(),
            "books": snapshot
                .iter()
                .map(|(slug, updated_at)| serde_json::json!({
                    "slug": slug,
                    "updatedAt": updated_at,
                }))
                .collect::<Vec<_>>(),
        });
        objects
            .put(
                &self.sitemap.accumulated_ids_key,
                serde_json::to_vec(&payload)?,
                "application/json",
            )
            .await
            .map_err(|e| crate::error::HydrateError::Transient(format!("sitemap upload: {e}")))?;
        tracing::info!(entries = snapshot.len(), key = %self.sitemap.accumulated_ids_key, "sitemap snapshot uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cron_expressions_parse() {
        for expression in ["0 0 * * * *", "0 0 6 * * SUN", "0 30 3 * * *"] {
            assert!(
                Schedule::from_str(expression).is_ok(),
                "expected {expression} to parse"
            );
        }
    }

    #[test]
    fn job_names_are_stable() {
        assert_eq!(Job::CacheWarming.name(), "cache-warming");
        assert_eq!(Job::BestsellerIngestion.name(), "bestseller-ingestion");
        assert_eq!(Job::SitemapSnapshot.name(), "sitemap-snapshot");
    }
}
