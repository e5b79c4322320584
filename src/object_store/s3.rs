use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use super::{ObjectMeta, ObjectStore};
use crate::config::S3Config;

/// S3-compatible store (AWS or MinIO-style endpoints) over a single shared
/// bucket handle.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
}

impl S3ObjectStore {
    pub fn new(config: &S3Config) -> anyhow::Result<Self> {
        let region = match &config.server_url {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config.region.parse()?,
        };
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            None,
            None,
            None,
        )?;
        let bucket = Bucket::new(&config.bucket, region, credentials)?.with_path_style();
        Ok(Self { bucket })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let response = match self.bucket.get_object(key).await {
            Ok(response) => response,
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match response.status_code() {
            200 => Ok(Some(response.to_vec())),
            404 => Ok(None),
            code => anyhow::bail!("object store GET {key} returned {code}"),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &bytes, content_type)
            .await?;
        match response.status_code() {
            200 | 204 => Ok(()),
            code => anyhow::bail!("object store PUT {key} returned {code}"),
        }
    }

    async fn head(&self, key: &str) -> anyhow::Result<Option<ObjectMeta>> {
        match self.bucket.head_object(key).await {
            Ok((head, 200)) => Ok(Some(ObjectMeta {
                size: head.content_length.unwrap_or(0).max(0) as u64,
                content_type: head.content_type,
            })),
            Ok((_, 404)) => Ok(None),
            Ok((_, code)) => anyhow::bail!("object store HEAD {key} returned {code}"),
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
