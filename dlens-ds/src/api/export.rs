//! YOLO dataset export endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use dlens_common::db::Dataset;
use serde::Serialize;

use crate::services::exporter::ExportRequest;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub ok: bool,
    pub dataset: Dataset,
    pub storage_prefix: String,
}

/// POST /api/datasets/export
///
/// 400 for invalid requests, 404 for an unknown project, 500 when an image
/// cannot be fetched or an object/row cannot be written.
pub async fn export_dataset(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> ApiResult<Json<ExportResponse>> {
    let Json(request) = payload?;
    let outcome = state.exporter().export(&request).await?;

    Ok(Json(ExportResponse {
        ok: true,
        dataset: outcome.dataset,
        storage_prefix: outcome.storage_prefix,
    }))
}

pub fn export_routes() -> Router<AppState> {
    Router::new().route("/api/datasets/export", post(export_dataset))
}
