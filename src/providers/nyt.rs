//! NYT Books API: the weekly full-overview bestseller payload.

use std::time::Duration;

use super::read_response;
use crate::config::NytConfig;
use crate::error::{HydrateError, HydrateResult};

pub const PROVIDER: &str = "NYT";

#[derive(Clone, Debug)]
pub struct NytClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl NytClient {
    pub fn new(config: &NytConfig) -> HydrateResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HydrateError::Transient(format!("building client: {e}")))?;
        Ok(NytClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// GET /lists/full-overview.json?api-key=...
    pub async fn fetch_overview(&self) -> HydrateResult<String> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            HydrateError::Permanent("NYT_API_KEY is not configured".into())
        })?;
        let url = format!("{}/lists/full-overview.json", self.base_url);
        let request = self.client.get(&url).query(&[("api-key", key)]);
        read_response(PROVIDER, request.send().await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_client_refuses_to_fetch() {
        let client = NytClient::new(&NytConfig {
            api_key: None,
            api_secret: None,
            base_url: "https://api.nytimes.com/svc/books/v3".into(),
        })
        .unwrap();
        assert!(!client.is_configured());
    }
}
