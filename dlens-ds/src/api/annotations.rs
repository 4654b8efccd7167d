//! Annotation persistence endpoints
//!
//! Entries are stored exactly as sent (natural-resolution coordinates plus
//! natural width/height). A PUT replaces the whole entry and marks the image
//! labeled, also when `boxes` is empty.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use dlens_common::editor::SaveOutcome;
use dlens_common::AnnotationEntry;
use serde::Serialize;

use crate::{ApiResult, AppState};

/// GET /api/annotations/:image_key
///
/// Unsaved images return an empty entry.
pub async fn get_annotations(
    State(state): State<AppState>,
    Path(image_key): Path<String>,
) -> ApiResult<Json<AnnotationEntry>> {
    let entry = state
        .annotations
        .load_entry(&image_key)
        .await?
        .unwrap_or_default();
    Ok(Json(entry))
}

/// PUT /api/annotations/:image_key
pub async fn put_annotations(
    State(state): State<AppState>,
    Path(image_key): Path<String>,
    payload: Result<Json<AnnotationEntry>, JsonRejection>,
) -> ApiResult<Json<SaveOutcome>> {
    let Json(entry) = payload?;
    entry.validate()?;

    state.annotations.save_entry(&image_key, &entry).await?;
    state.annotations.mark_labeled(&image_key).await?;

    tracing::info!(
        image_key = %image_key,
        boxes = entry.boxes.len(),
        width = ?entry.width,
        height = ?entry.height,
        "Annotations saved"
    );

    Ok(Json(SaveOutcome {
        image_key,
        box_count: entry.boxes.len(),
        natural_size: entry.natural_size(),
    }))
}

#[derive(Debug, Serialize)]
pub struct LabeledResponse {
    pub images: Vec<String>,
}

/// GET /api/labeled
pub async fn list_labeled(State(state): State<AppState>) -> ApiResult<Json<LabeledResponse>> {
    let images = state.annotations.labeled_images().await?;
    Ok(Json(LabeledResponse { images }))
}

pub fn annotation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/annotations/:image_key",
            get(get_annotations).put(put_annotations),
        )
        .route("/api/labeled", get(list_labeled))
}
