use std::time::Duration;

/// Process configuration, read from the environment once at boot.
/// `load()` never fails; `validate()` reports what is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3: Option<S3Config>,
    pub google_books: GoogleBooksConfig,
    pub nyt: NytConfig,
    pub sitemap: SitemapConfig,
    pub jobs: JobsConfig,
    pub resilience: ResilienceSettings,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub server_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub cdn_url: Option<String>,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct GoogleBooksConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct NytConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct SitemapConfig {
    pub accumulated_ids_key: String,
    pub cron: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct JobsConfig {
    pub nyt_cron: String,
    pub cache_warming_cron: String,
}

/// Per-provider rate-limit and breaker knobs, overridable through
/// `RATE_LIMIT_<PROVIDER>_*` and `CIRCUIT_<PROVIDER>_*` variables.
#[derive(Debug, Clone)]
pub struct ResilienceSettings {
    pub google_books: ProviderLimits,
    pub open_library: ProviderLimits,
    pub longitood: ProviderLimits,
    pub nyt: ProviderLimits,
}

#[derive(Debug, Clone)]
pub struct ProviderLimits {
    pub bucket_capacity: f64,
    pub bucket_refill_per_sec: f64,
    pub rate_limit_threshold: u32,
    pub failure_threshold: u32,
    pub rate_limit_open_secs: u64,
    pub failure_open_secs: u64,
}

impl ProviderLimits {
    fn load(env_name: &str, capacity: f64, refill: f64) -> Self {
        ProviderLimits {
            bucket_capacity: env_parse(&format!("RATE_LIMIT_{env_name}_CAPACITY"), capacity),
            bucket_refill_per_sec: env_parse(&format!("RATE_LIMIT_{env_name}_REFILL"), refill),
            rate_limit_threshold: env_parse(&format!("CIRCUIT_{env_name}_RATE_LIMIT_THRESHOLD"), 3),
            failure_threshold: env_parse(&format!("CIRCUIT_{env_name}_FAILURE_THRESHOLD"), 5),
            rate_limit_open_secs: env_parse(
                &format!("CIRCUIT_{env_name}_RATE_LIMIT_OPEN_SECS"),
                60 * 60,
            ),
            failure_open_secs: env_parse(&format!("CIRCUIT_{env_name}_FAILURE_OPEN_SECS"), 15 * 60),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> Self {
        let s3 = env_var("S3_BUCKET").map(|bucket| S3Config {
            bucket,
            server_url: env_var("S3_SERVER_URL"),
            access_key_id: env_var("S3_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: env_var("S3_SECRET_ACCESS_KEY").unwrap_or_default(),
            cdn_url: env_var("S3_CDN_URL"),
            region: env_var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        });

        Config {
            database_url: env_var("SPRING_DATASOURCE_URL").unwrap_or_default(),
            s3,
            google_books: GoogleBooksConfig {
                api_key: env_var("GOOGLE_BOOKS_API_KEY"),
                base_url: env_var("GOOGLE_BOOKS_API_BASE_URL")
                    .unwrap_or_else(|| "https://www.googleapis.com/books/v1".to_string()),
                max_results: env_parse("GOOGLE_BOOKS_API_MAX_RESULTS", 40u32).min(40),
                connect_timeout: Duration::from_secs(env_parse(
                    "GOOGLE_BOOKS_API_CONNECT_TIMEOUT",
                    5u64,
                )),
                read_timeout: Duration::from_secs(env_parse(
                    "GOOGLE_BOOKS_API_READ_TIMEOUT",
                    5u64,
                )),
            },
            nyt: NytConfig {
                api_key: env_var("NYT_API_KEY"),
                api_secret: env_var("NYT_API_SECRET"),
                base_url: env_var("NYT_API_BASE_URL")
                    .unwrap_or_else(|| "https://api.nytimes.com/svc/books/v3".to_string()),
            },
            sitemap: SitemapConfig {
                accumulated_ids_key: env_var("SITEMAP_S3_ACCUMULATED_IDS_KEY")
                    .unwrap_or_else(|| "sitemap/accumulated-book-ids.json".to_string()),
                cron: env_var("SITEMAP_SCHEDULER_CRON")
                    .unwrap_or_else(|| "0 0 * * * *".to_string()),
                enabled: env_parse("SITEMAP_SCHEDULER_ENABLED", true),
            },
            jobs: JobsConfig {
                nyt_cron: env_var("APP_NYT_SCHEDULER_CRON")
                    .unwrap_or_else(|| "0 0 6 * * SUN".to_string()),
                cache_warming_cron: env_var("APP_CACHE_WARMING_CRON")
                    .unwrap_or_else(|| "0 30 3 * * *".to_string()),
            },
            resilience: ResilienceSettings {
                google_books: ProviderLimits::load("GOOGLE_BOOKS", 10.0, 1.0),
                open_library: ProviderLimits::load("OPEN_LIBRARY", 10.0, 1.0),
                longitood: ProviderLimits::load("LONGITOOD", 5.0, 0.5),
                nyt: ProviderLimits::load("NYT", 5.0, 0.1),
            },
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err("SPRING_DATASOURCE_URL is missing".into());
        }
        if let Some(s3) = &self.s3 {
            if s3.access_key_id.is_empty() {
                return Err("S3_ACCESS_KEY_ID is missing".into());
            }
            if s3.secret_access_key.is_empty() {
                return Err("S3_SECRET_ACCESS_KEY is missing".into());
            }
        }
        if self.google_books.max_results == 0 {
            return Err("GOOGLE_BOOKS_API_MAX_RESULTS must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_database_url() {
        let mut config = Config::load();
        config.database_url = String::new();
        assert!(config.validate().is_err());
        config.database_url = "postgres://localhost/books".into();
        config.google_books.max_results = 40;
        if let Some(s3) = &mut config.s3 {
            s3.access_key_id = "k".into();
            s3.secret_access_key = "s".into();
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn max_results_is_capped_at_forty() {
        let config = Config::load();
        assert!(config.google_books.max_results <= 40);
    }
}
