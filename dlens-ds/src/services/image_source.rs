//! Image byte source for exports and the image proxy
//!
//! Stored images (numeric ids) are read in-process: image row, then object
//! key parsed from its `original_url`, then the object store. External images
//! are downloaded over HTTP. Every fetch is bounded by the configured timeout.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::db::images;
use crate::services::object_store::{ObjectStore, ObjectStoreError, StoredObject};

const USER_AGENT: &str = concat!("dlens-ds/", env!("CARGO_PKG_VERSION"));

/// Image fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Image {0} not found")]
    NotFound(i64),

    #[error("No stored image id or originalUrl")]
    NoSource,

    #[error("Could not determine storage key from {0}")]
    UnresolvableUrl(String),

    #[error("Storage error: {0}")]
    Storage(#[from] ObjectStoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Bytes of an image registered in the relational store
    async fn fetch_stored(&self, image_id: i64) -> Result<Vec<u8>, FetchError>;

    /// Bytes behind an arbitrary URL
    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Object key for a stored image URL
///
/// Accepts `s3://bucket/key`, virtual-hosted `https://bucket.s3.<region>.amazonaws.com/key`
/// and path-style `https://endpoint/bucket/key`. When the store has a bucket
/// name, a leading path segment equal to it is dropped; without one, the first
/// path segment of a path-style URL is taken as the bucket.
pub fn resolve_object_key(original_url: &str, bucket: Option<&str>) -> Option<String> {
    let url = reqwest::Url::parse(original_url).ok()?;
    let segments: Vec<&str> = url
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let key_segments: &[&str] = if url.scheme() == "s3" {
        &segments
    } else if let Some(bucket) = bucket {
        match segments.first() {
            Some(first) if *first == bucket => &segments[1..],
            _ => &segments,
        }
    } else {
        let host = url.host_str().unwrap_or_default();
        let host_parts: Vec<&str> = host.split('.').collect();
        let virtual_hosted = host_parts.len() > 3 && host_parts[1] == "s3";
        if virtual_hosted || segments.is_empty() {
            &segments
        } else {
            &segments[1..]
        }
    };

    let key = key_segments.join("/");
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Load a stored image's bytes and content type through the object store
pub async fn load_stored_image(
    pool: &SqlitePool,
    object_store: &dyn ObjectStore,
    image_id: i64,
) -> Result<StoredObject, FetchError> {
    let image = images::find_image(pool, image_id)
        .await?
        .ok_or(FetchError::NotFound(image_id))?;

    let key = resolve_object_key(&image.original_url, object_store.bucket())
        .ok_or_else(|| FetchError::UnresolvableUrl(image.original_url.clone()))?;

    tracing::debug!(image_id, key = %key, "Reading stored image");

    let mut object = object_store.get_object(&key).await?;
    if object.content_type.is_none() {
        object.content_type = image.mimetype;
    }
    Ok(object)
}

/// Default image source backed by the service's database and object store
pub struct ServiceImageSource {
    db: SqlitePool,
    object_store: Arc<dyn ObjectStore>,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl ServiceImageSource {
    pub fn new(
        db: SqlitePool,
        object_store: Arc<dyn ObjectStore>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            db,
            object_store,
            http_client,
            timeout,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageSource for ServiceImageSource {
    async fn fetch_stored(&self, image_id: i64) -> Result<Vec<u8>, FetchError> {
        let load = load_stored_image(&self.db, self.object_store.as_ref(), image_id);
        match tokio::time::timeout(self.timeout, load).await {
            Ok(result) => result.map(|object| object.bytes),
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url = %url, "Downloading image");
        match tokio::time::timeout(self.timeout, self.download(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }
}
