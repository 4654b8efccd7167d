//! Object storage backends
//!
//! Keys are `/`-separated relative paths such as
//! `projects/1/dataset/images/1700000000000-a.jpg`. Three backends:
//! - [`FsObjectStore`]: directory tree on local disk
//! - [`HttpObjectStore`]: S3-compatible endpoint, path-style URLs
//! - [`MemoryObjectStore`]: in-process map (tests)

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Object store errors
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Object store returned {0}: {1}")]
    Status(u16, String),
}

/// Object bytes with the content type recorded or inferred for them
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    async fn get_object(&self, key: &str) -> Result<StoredObject, ObjectStoreError>;

    /// Delete an object; deleting a missing object is not an error
    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Bucket name embedded in stored image URLs, if the backend has one
    fn bucket(&self) -> Option<&str> {
        None
    }
}

/// Reject keys that could escape the store root
fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    let escapes = Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn join_error(e: tokio::task::JoinError) -> ObjectStoreError {
    ObjectStoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// Content type sniffed from magic bytes
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

// ============================================================================
// Filesystem backend
// ============================================================================

/// Directory under the store root holding in-flight writes; never a key
const STAGING_DIR: &str = ".staging";

/// Stores each object as a file under `root/<key>`
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        if key.split('/').next() == Some(STAGING_DIR) {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn staging_path(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// All keys under `prefix`, sorted
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let root = self.root.clone();
        let staging = self.staging_path();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            if !root.exists() {
                return Ok(keys);
            }
            let entries = walkdir::WalkDir::new(&root)
                .into_iter()
                .filter_entry(|e| e.path() != staging);
            for entry in entries {
                let entry = entry.map_err(|e| ObjectStoreError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix) {
                    keys.push(key);
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(join_error)?
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        tokio::fs::create_dir_all(&staging).await?;

        // Staged outside the key space, then renamed into place
        let len = bytes.len();
        tokio::task::spawn_blocking(move || -> Result<(), ObjectStoreError> {
            let mut staged = tempfile::NamedTempFile::new_in(&staging)?;
            staged.write_all(&bytes)?;
            staged.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(join_error)??;

        tracing::debug!(key = %key, bytes = len, "Object written");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let content_type = sniff_content_type(&bytes).map(str::to_string);
        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// HTTP (S3-compatible) backend
// ============================================================================

/// Path-style S3-compatible store: `<endpoint>/<bucket>/<key>`
///
/// Requests carry an optional bearer token; endpoints requiring SigV4
/// signing should sit behind a signing gateway.
pub struct HttpObjectStore {
    http_client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ObjectStoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ObjectStoreError::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            token,
        })
    }

    fn url_for(&self, key: &str) -> Result<String, ObjectStoreError> {
        validate_key(key)?;
        Ok(format!("{}/{}/{}", self.endpoint, self.bucket, key))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(
        response: reqwest::Response,
        key: &str,
    ) -> Result<reqwest::Response, ObjectStoreError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Status(status.as_u16(), body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let url = self.url_for(key)?;
        let request = self
            .http_client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Http(e.to_string()))?;
        Self::check_status(response, key).await?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        let url = self.url_for(key)?;
        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Http(e.to_string()))?;
        let response = Self::check_status(response, key).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ObjectStoreError::Http(e.to_string()))?;

        Ok(StoredObject {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        let url = self.url_for(key)?;
        let response = self
            .authorize(self.http_client.delete(&url))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Http(e.to_string()))?;
        match Self::check_status(response, key).await {
            Ok(_) | Err(ObjectStoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn bucket(&self) -> Option<&str> {
        Some(&self.bucket)
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys under `prefix`, sorted
    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
