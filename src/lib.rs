//! Book metadata acquisition and hydration engine: a tiered resolver over
//! the canonical Postgres store, an S3-compatible payload cache, and the
//! external metadata providers, with aggregation, cover orchestration,
//! recommendations, and scheduled maintenance on top. HTTP serving, auth,
//! and rendering live outside this crate and consume [`App`]'s components.

pub mod aggregate;
pub mod config;
pub mod covers;
pub mod domain;
pub mod error;
pub mod identity;
pub mod object_store;
pub mod parser;
pub mod providers;
pub mod recommend;
pub mod resilience;
pub mod sched;
pub mod store;
pub mod tiered;

use std::sync::Arc;

use std::time::Duration;

use anyhow::Context;
use sea_orm::{ConnectOptions, Database};
use tokio::task::JoinHandle;

use config::Config;
use covers::CoverOrchestrator;
use migration::MigratorTrait;
use object_store::ObjectStore;
use object_store::cache::PayloadCache;
use object_store::s3::S3ObjectStore;
use providers::Providers;
use recommend::RecommendationEngine;
use sched::Scheduler;
use store::CanonicalStore;
use tiered::TieredResolver;

/// Long-lived engine components, constructed explicitly at boot and stopped
/// together on shutdown.
pub struct App {
    pub resolver: Arc<TieredResolver>,
    pub recommendations: Arc<RecommendationEngine>,
    pub covers: Arc<CoverOrchestrator>,
    scheduler: Arc<Scheduler>,
    jobs: Vec<JoinHandle<()>>,
}

impl App {
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let mut options = ConnectOptions::new(&config.database_url);
        options
            .max_connections(10)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .with_context(|| "Failed to connect to database")?;

        migration::Migrator::up(&db, None)
            .await
            .with_context(|| "Failed to run database migrations")?;

        let store = Arc::new(CanonicalStore::new(db));

        let objects: Option<Arc<dyn ObjectStore>> = match &config.s3 {
            Some(s3_config) => Some(Arc::new(
                S3ObjectStore::new(s3_config).with_context(|| "Failed to build S3 client")?,
            )),
            None => None,
        };
        let cache = objects
            .as_ref()
            .map(|store| Arc::new(PayloadCache::new(Arc::clone(store))));

        let providers = Arc::new(Providers::from_config(config)?);
        tracing::info!(
            google_books_authenticated = providers.google_books.is_authenticated(),
            nyt_configured = providers.nyt.is_configured(),
            object_store = objects.is_some(),
            "configured providers"
        );

        let covers = Arc::new(CoverOrchestrator::new(
            Arc::clone(&store),
            objects.clone(),
            providers.longitood.clone(),
            providers.guard("LONGITOOD"),
            config.s3.as_ref().and_then(|s3| s3.cdn_url.clone()),
        )?);

        let resolver = Arc::new(TieredResolver::new(
            Arc::clone(&store),
            cache,
            Arc::clone(&providers),
            Arc::clone(&covers),
        ));

        let recommendations = Arc::new(RecommendationEngine::new(Arc::clone(&store)));

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&resolver),
            Arc::clone(&store),
            providers,
            objects,
            Arc::clone(&recommendations),
            config.sitemap.clone(),
            config.jobs.clone(),
        ));

        Ok(App {
            resolver,
            recommendations,
            covers,
            scheduler,
            jobs: Vec::new(),
        })
    }

    pub fn start(&mut self) {
        self.jobs = self.scheduler.start();
        tracing::info!(jobs = self.jobs.len(), "scheduler running");
    }

    pub fn stop(self) {
        for handle in &self.jobs {
            handle.abort();
        }
        tracing::info!("scheduler stopped");
    }
}
