//! dlens-ds library interface
//!
//! Dataset service: annotation persistence, image proxy and YOLO dataset
//! export over HTTP. Exposed as a library for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use dlens_common::editor::AnnotationStore;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::db::SqliteAnnotationStore;
use crate::services::exporter::DatasetExporter;
use crate::services::image_source::{FetchError, ImageSource, ServiceImageSource};
use crate::services::object_store::ObjectStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Dataset and stored-image objects
    pub object_store: Arc<dyn ObjectStore>,
    /// Where exports read image bytes from
    pub image_source: Arc<dyn ImageSource>,
    /// Saved boxes and the labeled-image set
    pub annotations: Arc<dyn AnnotationStore>,
    /// Service startup timestamp
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        object_store: Arc<dyn ObjectStore>,
        fetch_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let image_source =
            ServiceImageSource::new(db.clone(), Arc::clone(&object_store), fetch_timeout)?;
        Ok(Self {
            annotations: Arc::new(SqliteAnnotationStore::new(db.clone())),
            db,
            object_store,
            image_source: Arc::new(image_source),
            startup_time: Utc::now(),
        })
    }

    /// Replace the image source (tests use stubs)
    pub fn with_image_source(mut self, image_source: Arc<dyn ImageSource>) -> Self {
        self.image_source = image_source;
        self
    }

    pub fn exporter(&self) -> DatasetExporter {
        DatasetExporter::new(
            self.db.clone(),
            Arc::clone(&self.object_store),
            Arc::clone(&self.image_source),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::export_routes())
        .merge(api::project_routes())
        .merge(api::image_routes())
        .merge(api::annotation_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
