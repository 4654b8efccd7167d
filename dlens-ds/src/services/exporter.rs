//! YOLO dataset exporter
//!
//! Turns a set of annotated images into image/label object pairs under
//! `projects/<projectId>/dataset/`, then records a `Dataset` row and links the
//! stored images to it.
//!
//! Every entry is validated before the first side effect. Images are then
//! processed one at a time in request order; the first failure stops the
//! export and the store is rolled back (best effort) before the error is
//! returned: objects this export created are deleted and objects it
//! overwrote get their previous bytes back. The dataset row and image links
//! are written in one transaction after all uploads succeed.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use dlens_common::db::{Dataset, DATASET_STATUS_READY};
use dlens_common::yolo;
use dlens_common::BoundingBox;

use crate::db::{datasets, images, projects};
use crate::services::image_source::{FetchError, ImageSource};
use crate::services::object_store::{
    sniff_content_type, ObjectStore, ObjectStoreError, StoredObject,
};

const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";
const LABEL_CONTENT_TYPE: &str = "text/plain";

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to fetch image {image}: {source}")]
    UpstreamFetch {
        image: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to write {key}: {source}")]
    StorageWrite {
        key: String,
        #[source]
        source: ObjectStoreError,
    },

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

/// Image identity as sent by clients: a stored image id or an opaque string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageIdentity {
    Number(i64),
    Text(String),
}

impl ImageIdentity {
    /// Id of a stored image, when the identity is all decimal digits
    pub fn stored_id(&self) -> Option<i64> {
        match self {
            ImageIdentity::Number(n) if *n >= 0 => Some(*n),
            ImageIdentity::Number(_) => None,
            ImageIdentity::Text(s) => {
                if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                    s.parse().ok()
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageIdentity::Number(n) => write!(f, "{}", n),
            ImageIdentity::Text(s) => f.write_str(s),
        }
    }
}

/// One image selected for export, with its saved annotation snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportImageEntry {
    pub id: ImageIdentity,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub annotations: Vec<BoundingBox>,
}

impl ExportImageEntry {
    /// Object filename: directory components dropped, `<id>.jpg` when empty
    pub fn effective_filename(&self) -> String {
        let name = self
            .filename
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
            .trim();
        if name.is_empty() {
            format!("{}.jpg", self.id)
        } else {
            name.to_string()
        }
    }

    fn has_valid_dimensions(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub images: Vec<ExportImageEntry>,
}

/// Successful export result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub dataset: Dataset,
    pub storage_prefix: String,
    /// Keys written, images and labels interleaved in request order
    #[serde(skip)]
    pub object_keys: Vec<String>,
    #[serde(skip)]
    pub linked_images: u64,
}

/// One object written during an export, with what it replaced
#[derive(Debug)]
enum WrittenObject {
    Created(String),
    Replaced { key: String, previous: StoredObject },
}

impl WrittenObject {
    fn key(&self) -> &str {
        match self {
            WrittenObject::Created(key) => key,
            WrittenObject::Replaced { key, .. } => key,
        }
    }
}

/// `projects/<projectId>/dataset/`
pub fn storage_prefix(project_id: i64) -> String {
    format!("projects/{}/dataset/", project_id)
}

pub struct DatasetExporter {
    db: SqlitePool,
    object_store: Arc<dyn ObjectStore>,
    image_source: Arc<dyn ImageSource>,
}

impl DatasetExporter {
    pub fn new(
        db: SqlitePool,
        object_store: Arc<dyn ObjectStore>,
        image_source: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            db,
            object_store,
            image_source,
        }
    }

    pub async fn export(&self, request: &ExportRequest) -> Result<ExportOutcome, ExportError> {
        let project_id = self.validate(request).await?;
        let prefix = storage_prefix(project_id);

        info!(
            project_id,
            images = request.images.len(),
            "Starting YOLO dataset export"
        );

        let mut written = Vec::with_capacity(request.images.len() * 2);
        match self.write_dataset(project_id, &prefix, request, &mut written).await {
            Ok((dataset, linked_images)) => {
                info!(
                    project_id,
                    dataset_id = dataset.id,
                    dataset = %dataset.name,
                    objects = written.len(),
                    linked_images,
                    "YOLO dataset export complete"
                );
                Ok(ExportOutcome {
                    dataset,
                    storage_prefix: prefix,
                    object_keys: written.iter().map(|w| w.key().to_string()).collect(),
                    linked_images,
                })
            }
            Err(e) => {
                warn!(project_id, error = %e, "Export failed, rolling back {} written objects", written.len());
                self.roll_back(written).await;
                Err(e)
            }
        }
    }

    /// Checks that need no side effects; returns the project id
    async fn validate(&self, request: &ExportRequest) -> Result<i64, ExportError> {
        let project_id = match request.project_id {
            Some(id) if id > 0 => id,
            _ => {
                return Err(ExportError::Validation(
                    "projectId and at least one image are required".to_string(),
                ))
            }
        };

        if projects::find_project(&self.db, project_id).await?.is_none() {
            return Err(ExportError::NotFound(format!(
                "Project {} not found",
                project_id
            )));
        }

        if request.images.is_empty() {
            return Err(ExportError::Validation(
                "projectId and at least one image are required".to_string(),
            ));
        }

        if let Some(entry) = request.images.iter().find(|e| !e.has_valid_dimensions()) {
            return Err(ExportError::Validation(format!(
                "Missing width/height for image {}. Ensure annotations were saved with image dimensions.",
                entry.id
            )));
        }

        Ok(project_id)
    }

    /// Upload every pair, then create and link the dataset
    ///
    /// Each upload is pushed to `written` as soon as it succeeds so the
    /// caller can roll back after a partial run. Image keys are stamped with
    /// the export start time plus the entry index, so entries sharing a
    /// filename never collide.
    async fn write_dataset(
        &self,
        project_id: i64,
        prefix: &str,
        request: &ExportRequest,
        written: &mut Vec<WrittenObject>,
    ) -> Result<(Dataset, u64), ExportError> {
        let stamp = chrono::Utc::now().timestamp_millis();
        for (index, entry) in request.images.iter().enumerate() {
            let bytes = self.fetch_image(entry).await?;
            let filename = entry.effective_filename();

            let image_key = format!("{}images/{}-{}", prefix, stamp + index as i64, filename);
            let content_type = sniff_content_type(&bytes).unwrap_or(DEFAULT_IMAGE_CONTENT_TYPE);
            self.put(&image_key, bytes, content_type, written).await?;

            let contents = yolo::label_file_contents(&entry.annotations, entry.width, entry.height);
            let label_key = format!("{}labels/{}", prefix, yolo::label_file_name(&filename));
            self.put(&label_key, contents.into_bytes(), LABEL_CONTENT_TYPE, written)
                .await?;

            debug!(
                image = %entry.id,
                image_key = %image_key,
                label_key = %label_key,
                boxes = entry.annotations.len(),
                "Exported image"
            );
        }

        let stored_ids: Vec<i64> = request
            .images
            .iter()
            .filter_map(|e| e.id.stored_id())
            .collect();

        let mut tx = self.db.begin().await?;
        let dataset = datasets::create_dataset(
            &mut *tx,
            project_id,
            &format!("yolo-export-{}", chrono::Utc::now().timestamp_millis()),
            DATASET_STATUS_READY,
        )
        .await?;
        let linked = images::update_images_dataset_id(&mut *tx, &stored_ids, dataset.id).await?;
        tx.commit().await?;

        Ok((dataset, linked))
    }

    async fn fetch_image(&self, entry: &ExportImageEntry) -> Result<Vec<u8>, ExportError> {
        let result = if let Some(id) = entry.id.stored_id() {
            self.image_source.fetch_stored(id).await
        } else if let Some(url) = entry.original_url.as_deref().filter(|u| !u.is_empty()) {
            self.image_source.fetch_url(url).await
        } else {
            Err(FetchError::NoSource)
        };

        result.map_err(|source| ExportError::UpstreamFetch {
            image: entry.id.to_string(),
            source,
        })
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        written: &mut Vec<WrittenObject>,
    ) -> Result<(), ExportError> {
        let storage_error = |source: ObjectStoreError| ExportError::StorageWrite {
            key: key.to_string(),
            source,
        };

        let record = match self.object_store.get_object(key).await {
            Ok(previous) => WrittenObject::Replaced {
                key: key.to_string(),
                previous,
            },
            Err(ObjectStoreError::NotFound(_)) => WrittenObject::Created(key.to_string()),
            Err(e) => return Err(storage_error(e)),
        };

        self.object_store
            .put_object(key, bytes, content_type)
            .await
            .map_err(storage_error)?;
        written.push(record);
        Ok(())
    }

    /// Undo `written` newest first, so a key written twice ends up as it was
    /// before the export
    async fn roll_back(&self, written: Vec<WrittenObject>) {
        for object in written.into_iter().rev() {
            let result = match &object {
                WrittenObject::Created(key) => self.object_store.delete_object(key).await,
                WrittenObject::Replaced { key, previous } => {
                    let fallback = if key.ends_with(".txt") {
                        LABEL_CONTENT_TYPE
                    } else {
                        DEFAULT_IMAGE_CONTENT_TYPE
                    };
                    let content_type = previous.content_type.as_deref().unwrap_or(fallback);
                    self.object_store
                        .put_object(key, previous.bytes.clone(), content_type)
                        .await
                }
            };
            if let Err(e) = result {
                warn!(key = %object.key(), error = %e, "Failed to roll back object after export failure");
            }
        }
    }
}
