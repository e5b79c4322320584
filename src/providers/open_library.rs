//! OpenLibrary: edition lookup by ISBN, title search, and the covers host.

use std::time::Duration;

use super::read_response;
use crate::error::{HydrateError, HydrateResult};

pub const PROVIDER: &str = "OPEN_LIBRARY";

const BASE_URL: &str = "https://openlibrary.org";

#[derive(Clone, Debug)]
pub struct OpenLibraryClient {
    base_url: String,
    client: reqwest::Client,
}

impl OpenLibraryClient {
    pub fn new() -> HydrateResult<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> HydrateResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HydrateError::Transient(format!("building client: {e}")))?;
        Ok(OpenLibraryClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// GET /isbn/{isbn}.json
    pub async fn fetch_by_isbn(&self, isbn: &str) -> HydrateResult<String> {
        let url = format!("{}/isbn/{}.json", self.base_url, isbn);
        read_response(PROVIDER, self.client.get(&url).send().await).await
    }

    /// GET /search.json?title={q}&limit={limit}
    pub async fn search_by_title(&self, title: &str, limit: u32) -> HydrateResult<String> {
        let url = format!("{}/search.json", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("title", title), ("limit", &limit.to_string())]);
        read_response(PROVIDER, request.send().await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let client = OpenLibraryClient::with_base_url("https://openlibrary.org/").unwrap();
        assert_eq!(client.base_url, "https://openlibrary.org");
    }
}
