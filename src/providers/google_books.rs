//! GoogleBooks volumes API. Exists in an authenticated and an
//! unauthenticated flavor (same client, key optional); search is exposed as
//! a lazy paged stream.

use std::collections::BTreeMap;

use futures_util::Stream;

use super::read_response;
use crate::config::GoogleBooksConfig;
use crate::domain::models::{Book, ProviderSource};
use crate::error::{HydrateError, HydrateResult};
use crate::parser;

pub const PROVIDER: &str = "GOOGLE_BOOKS";

/// Search pagination: provider page size and the hard cap on streamed items.
pub const PAGE_SIZE: u32 = 40;
pub const MAX_STREAM_ITEMS: usize = 200;

#[derive(Clone, Debug)]
pub struct GoogleBooksClient {
    base_url: String,
    api_key: Option<String>,
    page_size: u32,
    client: reqwest::Client,
}

impl GoogleBooksClient {
    pub fn new(config: &GoogleBooksConfig) -> HydrateResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| HydrateError::Transient(format!("building client: {e}")))?;
        Ok(GoogleBooksClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_size: config.max_results.clamp(1, PAGE_SIZE),
            client,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn keyed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("key", key.as_str())]),
            None => request,
        }
    }

    /// GET /volumes/{id}, returning the raw volume JSON.
    pub async fn fetch_by_id(&self, volume_id: &str) -> HydrateResult<String> {
        let request = self.keyed(self.client.get(self.url(&format!("volumes/{volume_id}"))));
        read_response(PROVIDER, request.send().await).await
    }

    /// GET /volumes?q=isbn:{isbn}
    pub async fn fetch_by_isbn(&self, isbn: &str) -> HydrateResult<String> {
        self.search_page(&format!("isbn:{isbn}"), 0).await
    }

    /// One search page starting at `start_index`.
    pub async fn search_page(&self, query: &str, start_index: u32) -> HydrateResult<String> {
        let request = self
            .client
            .get(self.url("volumes"))
            .query(&[
                ("q", query),
                ("startIndex", &start_index.to_string()),
                ("maxResults", &self.page_size.to_string()),
            ]);
        read_response(PROVIDER, self.keyed(request).send().await).await
    }

    /// Lazy paged search: pages are fetched sequentially as the consumer
    /// pulls, halting on an empty page, a provider error, or the item cap.
    pub fn search_stream(
        &self,
        query: String,
        max_items: usize,
    ) -> impl Stream<Item = HydrateResult<Book>> {
        let client = self.clone();
        let cap = max_items.min(MAX_STREAM_ITEMS);
        async_stream::try_stream! {
            let mut start_index = 0u32;
            let mut yielded = 0usize;
            'pages: loop {
                let body = client.search_page(&query, start_index).await?;
                let books = parser::parse_payload(ProviderSource::GoogleBooks, &body)?;
                if books.is_empty() {
                    break;
                }
                let page_len = books.len();
                for book in books {
                    yield book;
                    yielded += 1;
                    if yielded >= cap {
                        break 'pages;
                    }
                }
                if page_len < client.page_size as usize {
                    break;
                }
                start_index += client.page_size;
            }
        }
    }
}

/// Compose a volumes query from free text and extracted qualifiers
/// (`intitle:`, `inauthor:`, `subject:`, `isbn:`).
pub fn compose_query(free_text: &str, qualifiers: &BTreeMap<String, serde_json::Value>) -> String {
    let mut parts = Vec::new();
    if !free_text.trim().is_empty() {
        parts.push(free_text.trim().to_string());
    }
    for (name, value) in qualifiers {
        if let Some(value) = value.as_str() {
            parts.push(format!("{name}:{value}"));
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_query_with_qualifiers() {
        let mut qualifiers = BTreeMap::new();
        qualifiers.insert("intitle".to_string(), serde_json::json!("shining"));
        qualifiers.insert("inauthor".to_string(), serde_json::json!("king"));
        assert_eq!(
            compose_query("horror", &qualifiers),
            "horror inauthor:king intitle:shining"
        );
        assert_eq!(compose_query("", &BTreeMap::new()), "");
    }

    #[test]
    fn page_size_is_clamped() {
        let config = GoogleBooksConfig {
            api_key: None,
            base_url: "https://example.com/books/v1".into(),
            max_results: 400,
            connect_timeout: std::time::Duration::from_secs(5),
            read_timeout: std::time::Duration::from_secs(5),
        };
        let client = GoogleBooksClient::new(&config).unwrap();
        assert_eq!(client.page_size, PAGE_SIZE);
        assert!(!client.is_authenticated());
    }
}
