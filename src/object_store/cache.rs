//! Provider-payload JSON cache under `books/v1/`. Payloads are stored
//! gzip-compressed; reads auto-detect gzip by magic bytes and fall back to
//! raw UTF-8 for objects written before compression was introduced.

use std::io::{Read, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use super::{ObjectStore, payload_key};
use crate::domain::models::Book;
use crate::error::{HydrateError, HydrateResult};
use crate::parser::canonical;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
/// An existing payload wins a smart update when its description is at least
/// this much longer than the incoming one.
const DESCRIPTION_KEEP_RATIO: f64 = 1.10;

pub struct PayloadCache {
    store: Arc<dyn ObjectStore>,
}

impl PayloadCache {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetch and decompress the cached payload for an external id.
    pub async fn fetch(&self, external_id: &str) -> HydrateResult<Option<String>> {
        let key = payload_key(external_id);
        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(|e| HydrateError::Transient(format!("object store get {key}: {e}")))?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let text = decompress(&bytes)
            .map_err(|e| HydrateError::Corrupt(format!("cached payload {key}: {e}")))?;
        Ok(Some(text))
    }

    /// Compress and upload a payload, replacing any existing object.
    pub async fn put(&self, external_id: &str, json: &str) -> HydrateResult<()> {
        let key = payload_key(external_id);
        let compressed = compress(json)
            .map_err(|e| HydrateError::Transient(format!("gzip {key}: {e}")))?;
        self.store
            .put(&key, compressed, "application/json")
            .await
            .map_err(|e| HydrateError::Transient(format!("object store put {key}: {e}")))
    }

    /// Smart update: when the existing payload is richer than the incoming
    /// book (longer description by >=10%, or more non-null key fields), keep
    /// it and only merge in the incoming qualifiers; otherwise replace.
    pub async fn update(&self, external_id: &str, book: &Book) -> HydrateResult<()> {
        let incoming = canonical::to_canonical_json(book);
        let merged = match self.fetch(external_id).await? {
            Some(existing_text) => match serde_json::from_str::<serde_json::Value>(&existing_text)
            {
                Ok(mut existing) => {
                    if existing_is_richer(&existing, &incoming) {
                        merge_qualifiers(&mut existing, &incoming);
                        existing
                    } else {
                        incoming
                    }
                }
                // A corrupt cached object never outranks fresh data.
                Err(_) => incoming,
            },
            None => incoming,
        };
        let text = serde_json::to_string(&merged)?;
        self.put(external_id, &text).await
    }
}

fn compress(text: &str) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()
}

fn decompress(bytes: &[u8]) -> anyhow::Result<String> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = String::new();
        decoder.read_to_string(&mut out)?;
        Ok(out)
    } else {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

fn description_len(payload: &serde_json::Value) -> usize {
    payload
        .pointer("/volumeInfo/description")
        .and_then(|v| v.as_str())
        .map(str::len)
        .unwrap_or(0)
}

/// Fields whose presence makes one payload "richer" than another.
const KEY_FIELDS: &[&str] = &[
    "title",
    "subtitle",
    "description",
    "authors",
    "publisher",
    "publishedDate",
    "pageCount",
    "categories",
    "imageLinks",
    "industryIdentifiers",
    "language",
];

fn non_null_key_fields(payload: &serde_json::Value) -> usize {
    let Some(info) = payload.get("volumeInfo") else {
        return 0;
    };
    KEY_FIELDS
        .iter()
        .filter(|field| matches!(info.get(**field), Some(v) if !v.is_null()))
        .count()
}

fn existing_is_richer(existing: &serde_json::Value, incoming: &serde_json::Value) -> bool {
    let existing_desc = description_len(existing) as f64;
    let incoming_desc = description_len(incoming) as f64;
    if existing_desc >= incoming_desc * DESCRIPTION_KEEP_RATIO && existing_desc > 0.0 {
        return true;
    }
    non_null_key_fields(existing) > non_null_key_fields(incoming)
}

fn merge_qualifiers(existing: &mut serde_json::Value, incoming: &serde_json::Value) {
    let Some(incoming_qualifiers) = incoming.get("qualifiers").and_then(|q| q.as_object()) else {
        return;
    };
    if incoming_qualifiers.is_empty() {
        return;
    }
    let target = existing
        .as_object_mut()
        .map(|o| {
            o.entry("qualifiers")
                .or_insert_with(|| serde_json::json!({}))
        })
        .and_then(|v| v.as_object_mut());
    if let Some(target) = target {
        for (key, value) in incoming_qualifiers {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::memory::InMemoryObjectStore;

    fn cache() -> PayloadCache {
        PayloadCache::new(Arc::new(InMemoryObjectStore::new()))
    }

    #[tokio::test]
    async fn round_trips_gzipped_payloads() {
        let cache = cache();
        cache.put("vol1", r#"{"id":"vol1"}"#).await.unwrap();
        let fetched = cache.fetch("vol1").await.unwrap();
        assert_eq!(fetched.as_deref(), Some(r#"{"id":"vol1"}"#));
    }

    #[tokio::test]
    async fn fetch_falls_back_to_raw_utf8() {
        let store = Arc::new(InMemoryObjectStore::new());
        store
            .put(
                &payload_key("legacy"),
                br#"{"id":"legacy"}"#.to_vec(),
                "application/json",
            )
            .await
            .unwrap();
        let cache = PayloadCache::new(store);
        assert_eq!(
            cache.fetch("legacy").await.unwrap().as_deref(),
            Some(r#"{"id":"legacy"}"#)
        );
    }

    #[tokio::test]
    async fn fetch_misses_return_none() {
        assert_eq!(cache().fetch("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_keeps_richer_existing_payload() {
        let cache = cache();
        let rich = serde_json::json!({
            "id": "vol1",
            "volumeInfo": {
                "title": "The Shining",
                "description": "x".repeat(500),
                "authors": ["Stephen King"],
                "publisher": "Doubleday",
            }
        });
        cache
            .put("vol1", &serde_json::to_string(&rich).unwrap())
            .await
            .unwrap();

        let mut thin = Book::with_title("The Shining");
        thin.external_id = Some("vol1".into());
        thin.description = Some("short".into());
        thin.qualifiers
            .insert("nytBestseller".into(), serde_json::json!({"rank": 1}));
        cache.update("vol1", &thin).await.unwrap();

        let stored: serde_json::Value =
            serde_json::from_str(&cache.fetch("vol1").await.unwrap().unwrap()).unwrap();
        assert_eq!(description_len(&stored), 500);
        assert_eq!(
            stored.pointer("/qualifiers/nytBestseller/rank"),
            Some(&serde_json::json!(1))
        );
    }

    #[tokio::test]
    async fn update_replaces_thinner_existing_payload() {
        let cache = cache();
        cache
            .put("vol1", r#"{"id":"vol1","volumeInfo":{"title":"T"}}"#)
            .await
            .unwrap();

        let mut fresh = Book::with_title("The Shining");
        fresh.external_id = Some("vol1".into());
        fresh.description = Some("a much longer description than before".into());
        fresh.authors.push("Stephen King".into());
        cache.update("vol1", &fresh).await.unwrap();

        let stored: serde_json::Value =
            serde_json::from_str(&cache.fetch("vol1").await.unwrap().unwrap()).unwrap();
        assert_eq!(
            stored.pointer("/volumeInfo/title"),
            Some(&serde_json::json!("The Shining"))
        );
        assert!(description_len(&stored) > 0);
    }

    #[test]
    fn richness_comparison_uses_description_threshold() {
        let long = serde_json::json!({"volumeInfo": {"description": "x".repeat(111)}});
        let short = serde_json::json!({"volumeInfo": {"description": "x".repeat(100)}});
        assert!(existing_is_richer(&long, &short));
        // within 10%: falls back to field count, which ties
        let close = serde_json::json!({"volumeInfo": {"description": "x".repeat(105)}});
        assert!(!existing_is_richer(&close, &short));
    }
}
