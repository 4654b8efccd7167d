//! Stored image proxy

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::parse_id;
use crate::services::image_source::load_stored_image;
use crate::{ApiResult, AppState};

/// GET /api/images/:id/proxy
///
/// Streams the stored bytes of an image with its content type.
pub async fn proxy_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let image_id = parse_id(&id, "image")?;
    let object = load_stored_image(&state.db, state.object_store.as_ref(), image_id).await?;

    let content_type = object
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], object.bytes).into_response())
}

pub fn image_routes() -> Router<AppState> {
    Router::new().route("/api/images/:id/proxy", get(proxy_image))
}
