//! Database models
//!
//! Rows serialize in camelCase because they are returned as-is by the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status given to a dataset when an export completes
pub const DATASET_STATUS_READY: &str = "ready";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Uploaded image known to the relational store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: i64,
    pub project_id: i64,
    /// Storage location, e.g. `s3://bucket/projects/1/uploads/...`
    pub original_url: String,
    pub filename: String,
    pub size: Option<i64>,
    pub mimetype: Option<String>,
    pub dataset_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Exported collection of image/label pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
