//! Object-store access. The driver itself is an external collaborator; the
//! engine consumes it through the narrow [`ObjectStore`] trait, with an
//! S3-compatible implementation for production and an in-memory one for
//! tests.

pub mod cache;
#[cfg(test)]
pub mod memory;
pub mod s3;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeta {
    pub size: u64,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()>;
    async fn head(&self, key: &str) -> anyhow::Result<Option<ObjectMeta>>;
}

/// Key prefixes shared by the payload cache and the cover pipeline.
pub const PAYLOAD_PREFIX: &str = "books/v1";
pub const COVER_PREFIX: &str = "images/book-covers";

pub fn payload_key(external_id: &str) -> String {
    format!("{PAYLOAD_PREFIX}/{external_id}.json")
}

pub fn cover_key(external_id: &str) -> String {
    format!("{COVER_PREFIX}/{external_id}-lg-google-books.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_conventions() {
        assert_eq!(payload_key("zyBCR8pEjqwC"), "books/v1/zyBCR8pEjqwC.json");
        assert_eq!(
            cover_key("zyBCR8pEjqwC"),
            "images/book-covers/zyBCR8pEjqwC-lg-google-books.jpg"
        );
    }
}
