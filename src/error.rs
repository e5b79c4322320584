use reqwest::StatusCode;
use thiserror::Error;

/// Failure taxonomy for the hydration engine. Tiers classify every failure
/// into one of these kinds before deciding to retry, trip a breaker, or fall
/// through; only `NotFound` and `DataIntegrity` survive to the outermost
/// caller distinctly.
#[derive(Debug, Error)]
pub enum HydrateError {
    #[error("not found")]
    NotFound,
    #[error("rate limited by {provider}")]
    RateLimited { provider: String },
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("permanent failure: {0}")]
    Permanent(String),
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),
    #[error("corrupt payload: {0}")]
    Corrupt(String),
}

pub type HydrateResult<T> = Result<T, HydrateError>;

impl HydrateError {
    /// Retriable per the retry policy: network-level and 5xx failures.
    /// Rate limits get a single delayed retry, handled by the policy itself.
    pub fn is_retriable(&self) -> bool {
        matches!(self, HydrateError::Transient(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, HydrateError::RateLimited { .. })
    }

    /// Classify an HTTP status from a provider. 429 is a rate-limit signal
    /// (trips breakers faster), other 4xx are permanent, 5xx transient.
    pub fn from_status(provider: &str, status: StatusCode) -> Self {
        if status == StatusCode::NOT_FOUND {
            HydrateError::NotFound
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            HydrateError::RateLimited {
                provider: provider.to_string(),
            }
        } else if status.is_server_error() {
            HydrateError::Transient(format!("{provider} returned {status}"))
        } else {
            HydrateError::Permanent(format!("{provider} returned {status}"))
        }
    }

    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(provider, status);
        }
        if err.is_timeout() || err.is_connect() || err.is_request() {
            HydrateError::Transient(format!("{provider}: {err}"))
        } else if err.is_decode() {
            HydrateError::Corrupt(format!("{provider}: {err}"))
        } else {
            HydrateError::Transient(format!("{provider}: {err}"))
        }
    }
}

impl From<sea_orm::DbErr> for HydrateError {
    fn from(err: sea_orm::DbErr) -> Self {
        match &err {
            sea_orm::DbErr::RecordNotFound(_) => HydrateError::NotFound,
            sea_orm::DbErr::Query(runtime) | sea_orm::DbErr::Exec(runtime) => {
                let msg = runtime.to_string();
                // Unique/foreign-key violations should not happen given the
                // upsert algorithm; surface them distinctly.
                if msg.contains("duplicate key") || msg.contains("violates") {
                    HydrateError::DataIntegrity(msg)
                } else {
                    HydrateError::Transient(msg)
                }
            }
            _ => HydrateError::Transient(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for HydrateError {
    fn from(err: serde_json::Error) -> Self {
        HydrateError::Corrupt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            HydrateError::from_status("GOOGLE_BOOKS", StatusCode::NOT_FOUND),
            HydrateError::NotFound
        ));
        assert!(
            HydrateError::from_status("GOOGLE_BOOKS", StatusCode::TOO_MANY_REQUESTS)
                .is_rate_limit()
        );
        assert!(
            HydrateError::from_status("NYT", StatusCode::BAD_GATEWAY).is_retriable()
        );
        assert!(matches!(
            HydrateError::from_status("NYT", StatusCode::BAD_REQUEST),
            HydrateError::Permanent(_)
        ));
    }

    #[test]
    fn only_transient_is_retriable() {
        assert!(!HydrateError::NotFound.is_retriable());
        assert!(!HydrateError::Permanent("x".into()).is_retriable());
        assert!(!HydrateError::Corrupt("x".into()).is_retriable());
        assert!(HydrateError::Transient("x".into()).is_retriable());
    }
}
