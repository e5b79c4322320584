//! Longitood serves cover URLs only: `GET /cover?isbn=...` returns a small
//! JSON document with the image URL.

use std::time::Duration;

use serde::Deserialize;

use super::read_response;
use crate::error::{HydrateError, HydrateResult};

pub const PROVIDER: &str = "LONGITOOD";

const BASE_URL: &str = "https://bookcover.longitood.com";

#[derive(Debug, Deserialize)]
struct CoverResponse {
    url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LongitoodClient {
    base_url: String,
    client: reqwest::Client,
}

impl LongitoodClient {
    pub fn new() -> HydrateResult<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> HydrateResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HydrateError::Transient(format!("building client: {e}")))?;
        Ok(LongitoodClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Resolve the cover image URL for an ISBN, when Longitood knows one.
    pub async fn cover_url(&self, isbn: &str) -> HydrateResult<Option<String>> {
        let url = format!("{}/cover", self.base_url);
        let request = self.client.get(&url).query(&[("isbn", isbn)]);
        let body = match read_response(PROVIDER, request.send().await).await {
            Ok(body) => body,
            Err(HydrateError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };
        let parsed: CoverResponse = serde_json::from_str(&body)
            .map_err(|e| HydrateError::Corrupt(format!("{PROVIDER}: {e}")))?;
        Ok(parsed.url.filter(|u| !u.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_response_deserializes() {
        let parsed: CoverResponse =
            serde_json::from_str(r#"{"url":"https://img/cover.jpg"}"#).unwrap();
        assert_eq!(parsed.url.as_deref(), Some("https://img/cover.jpg"));
    }
}
