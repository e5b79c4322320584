//! HTTP clients for the metadata providers, one module per provider, plus
//! the wiring that pairs each client with its resilience guard. Clients are
//! transport only: they return raw body text and classified errors; parsing
//! happens in the parser layer and guard composition at the call sites.

pub mod google_books;
pub mod longitood;
pub mod nyt;
pub mod open_library;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ProviderLimits};
use crate::error::{HydrateError, HydrateResult};
use crate::resilience::breaker::BreakerConfig;
use crate::resilience::rate::TokenBucket;
use crate::resilience::retry::RetryPolicy;
use crate::resilience::{ProviderGuard, ResilienceRegistry};

pub use google_books::GoogleBooksClient;
pub use longitood::LongitoodClient;
pub use nyt::NytClient;
pub use open_library::OpenLibraryClient;

/// All provider clients plus the per-provider guard registry, constructed
/// once at boot and shared.
pub struct Providers {
    pub google_books: GoogleBooksClient,
    /// Key-less variant used when the authenticated client is throttled.
    pub google_books_unauthenticated: GoogleBooksClient,
    pub open_library: OpenLibraryClient,
    pub longitood: LongitoodClient,
    pub nyt: NytClient,
    pub guards: ResilienceRegistry,
}

impl Providers {
    pub fn from_config(config: &Config) -> HydrateResult<Self> {
        let mut guards = ResilienceRegistry::new();
        guards.register(build_guard("GOOGLE_BOOKS", &config.resilience.google_books));
        guards.register(build_guard("OPEN_LIBRARY", &config.resilience.open_library));
        guards.register(build_guard("LONGITOOD", &config.resilience.longitood));
        guards.register(build_guard("NYT", &config.resilience.nyt));

        let mut unauthenticated = config.google_books.clone();
        unauthenticated.api_key = None;

        Ok(Providers {
            google_books: GoogleBooksClient::new(&config.google_books)?,
            google_books_unauthenticated: GoogleBooksClient::new(&unauthenticated)?,
            open_library: OpenLibraryClient::new()?,
            longitood: LongitoodClient::new()?,
            nyt: NytClient::new(&config.nyt)?,
            guards,
        })
    }

    pub fn guard(&self, provider: &str) -> Arc<ProviderGuard> {
        self.guards
            .get(provider)
            .unwrap_or_else(|| Arc::new(build_guard(provider, &ProviderLimits::fallback())))
    }
}

impl ProviderLimits {
    /// Permissive stand-in for a provider missing from the registry.
    fn fallback() -> Self {
        ProviderLimits {
            bucket_capacity: 10.0,
            bucket_refill_per_sec: 1.0,
            rate_limit_threshold: 3,
            failure_threshold: 5,
            rate_limit_open_secs: 3600,
            failure_open_secs: 900,
        }
    }
}

fn build_guard(name: &str, limits: &ProviderLimits) -> ProviderGuard {
    ProviderGuard::new(
        name,
        BreakerConfig {
            rate_limit_threshold: limits.rate_limit_threshold,
            failure_threshold: limits.failure_threshold,
            rate_limit_open_for: Duration::from_secs(limits.rate_limit_open_secs),
            failure_open_for: Duration::from_secs(limits.failure_open_secs),
            half_open_probes: 1,
        },
        TokenBucket::new(limits.bucket_capacity, limits.bucket_refill_per_sec),
        RetryPolicy::default(),
    )
}

/// Shared response handling: map transport errors and non-success statuses
/// through the taxonomy, return the body text otherwise.
pub(crate) async fn read_response(
    provider: &str,
    response: Result<reqwest::Response, reqwest::Error>,
) -> HydrateResult<String> {
    let response = response.map_err(|e| HydrateError::from_reqwest(provider, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(HydrateError::from_status(provider, status));
    }
    response
        .text()
        .await
        .map_err(|e| HydrateError::from_reqwest(provider, e))
}
