//! Project-scoped listings

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use dlens_common::db::{Dataset, ImageRecord};
use dlens_common::editor::next_unlabeled;
use serde::Serialize;

use super::parse_id;
use crate::db::{datasets, images, projects};
use crate::{ApiError, ApiResult, AppState};

async fn require_project(state: &AppState, raw_id: &str) -> ApiResult<i64> {
    let project_id = parse_id(raw_id, "project")?;
    if projects::find_project(&state.db, project_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Project {} not found", project_id)));
    }
    Ok(project_id)
}

/// GET /api/projects/:id/images (newest first)
pub async fn list_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ImageRecord>>> {
    let project_id = require_project(&state, &id).await?;
    let rows = images::list_project_images(&state.db, project_id).await?;
    Ok(Json(rows))
}

/// GET /api/projects/:id/datasets
pub async fn list_datasets(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Dataset>>> {
    let project_id = require_project(&state, &id).await?;
    let rows = datasets::list_project_datasets(&state.db, project_id).await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextUnlabeledResponse {
    /// `None` only when the project has no images
    pub image_id: Option<String>,
}

/// GET /api/projects/:id/next-unlabeled
///
/// First image in listing order without a completed save; the first image
/// when all are labeled.
pub async fn next_unlabeled_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<NextUnlabeledResponse>> {
    let project_id = require_project(&state, &id).await?;
    let candidates: Vec<String> = images::list_project_images(&state.db, project_id)
        .await?
        .into_iter()
        .map(|image| image.id.to_string())
        .collect();

    let image_id = next_unlabeled(state.annotations.as_ref(), &candidates).await?;
    Ok(Json(NextUnlabeledResponse { image_id }))
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:id/images", get(list_images))
        .route("/api/projects/:id/datasets", get(list_datasets))
        .route("/api/projects/:id/next-unlabeled", get(next_unlabeled_image))
}
