//! HTTP API handlers

pub mod annotations;
pub mod export;
pub mod health;
pub mod images;
pub mod projects;

pub use annotations::annotation_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use images::image_routes;
pub use projects::project_routes;

use crate::{ApiError, ApiResult};

/// Parse a numeric path id, rejecting anything else with 400
pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} id", what)))
}
