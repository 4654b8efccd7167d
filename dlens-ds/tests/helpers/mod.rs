//! Shared fixtures for dlens-ds integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dlens_common::db::{init_memory_database, ImageRecord, Project};
use dlens_ds::db::images::{insert_image, NewImage};
use dlens_ds::db::projects::create_project;
use dlens_ds::services::exporter::DatasetExporter;
use dlens_ds::services::image_source::{FetchError, ImageSource};
use dlens_ds::services::object_store::{MemoryObjectStore, ObjectStore};
use dlens_ds::AppState;

pub const BUCKET_URL_PREFIX: &str = "s3://dlens";

/// Minimal PNG signature, enough for content sniffing
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

/// Image source answering from canned bytes and recording every request
#[derive(Default)]
pub struct StubImageSource {
    stored: Mutex<HashMap<i64, Vec<u8>>>,
    urls: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<i64>>,
    calls: Mutex<Vec<String>>,
}

impl StubImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stored(self, id: i64, bytes: &[u8]) -> Self {
        self.stored.lock().unwrap().insert(id, bytes.to_vec());
        self
    }

    pub fn with_url(self, url: &str, bytes: &[u8]) -> Self {
        self.urls.lock().unwrap().insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn failing(self, id: i64) -> Self {
        self.failing.lock().unwrap().insert(id);
        self
    }

    /// Requests seen so far, as `stored:<id>` or `url:<url>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for StubImageSource {
    async fn fetch_stored(&self, image_id: i64) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(format!("stored:{}", image_id));
        if self.failing.lock().unwrap().contains(&image_id) {
            return Err(FetchError::Timeout(Duration::from_secs(30)));
        }
        self.stored
            .lock()
            .unwrap()
            .get(&image_id)
            .cloned()
            .ok_or(FetchError::NotFound(image_id))
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(format!("url:{}", url));
        self.urls
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// In-memory database and object store with a stub image source
pub struct TestContext {
    pub pool: SqlitePool,
    pub store: Arc<MemoryObjectStore>,
    pub source: Arc<StubImageSource>,
}

impl TestContext {
    pub async fn new(source: StubImageSource) -> Self {
        Self {
            pool: init_memory_database()
                .await
                .expect("Failed to create in-memory database"),
            store: Arc::new(MemoryObjectStore::new()),
            source: Arc::new(source),
        }
    }

    pub fn exporter(&self) -> DatasetExporter {
        DatasetExporter::new(self.pool.clone(), self.store.clone(), self.source.clone())
    }

    /// State wired like production, apart from the stub image source
    pub fn state(&self) -> AppState {
        AppState::new(self.pool.clone(), self.store.clone(), Duration::from_secs(5))
            .expect("Failed to build app state")
            .with_image_source(self.source.clone())
    }

    pub fn app(&self) -> axum::Router {
        dlens_ds::build_router(self.state())
    }

    pub async fn dataset_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM datasets")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

pub async fn seed_project(pool: &SqlitePool, name: &str) -> Project {
    create_project(pool, name)
        .await
        .expect("Failed to create project")
}

/// Register an uploaded image and put its bytes in the object store
pub async fn seed_stored_image(
    pool: &SqlitePool,
    store: &dyn ObjectStore,
    project_id: i64,
    filename: &str,
    bytes: &[u8],
) -> ImageRecord {
    let key = format!("projects/{}/uploads/1700000000000-{}", project_id, filename);
    store
        .put_object(&key, bytes.to_vec(), "image/png")
        .await
        .expect("Failed to store image");

    insert_image(
        pool,
        &NewImage {
            project_id,
            original_url: format!("{}/{}", BUCKET_URL_PREFIX, key),
            filename: filename.to_string(),
            size: Some(bytes.len() as i64),
            mimetype: Some("image/png".to_string()),
        },
    )
    .await
    .expect("Failed to insert image")
}
