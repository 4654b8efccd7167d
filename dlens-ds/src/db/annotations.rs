//! SQLite-backed annotation store
//!
//! Entries live in `annotations` (boxes as a JSON array), the labeled set in
//! `labeled_images`. Saves replace the whole entry; concurrent saves for the
//! same image resolve as last-writer-wins.

use async_trait::async_trait;
use dlens_common::editor::AnnotationStore;
use dlens_common::{AnnotationEntry, BoundingBox, Result};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct SqliteAnnotationStore {
    pool: SqlitePool,
}

impl SqliteAnnotationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnnotationStore for SqliteAnnotationStore {
    async fn load_entry(&self, image_key: &str) -> Result<Option<AnnotationEntry>> {
        let row = sqlx::query("SELECT boxes, width, height FROM annotations WHERE image_key = ?")
            .bind(image_key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let boxes_json: String = row.get("boxes");
        let boxes: Vec<BoundingBox> = serde_json::from_str(&boxes_json)?;
        let width: Option<i64> = row.get("width");
        let height: Option<i64> = row.get("height");

        Ok(Some(AnnotationEntry {
            boxes,
            width: width.and_then(|w| u32::try_from(w).ok()),
            height: height.and_then(|h| u32::try_from(h).ok()),
        }))
    }

    async fn save_entry(&self, image_key: &str, entry: &AnnotationEntry) -> Result<()> {
        let boxes_json = serde_json::to_string(&entry.boxes)?;

        sqlx::query(
            r#"
            INSERT INTO annotations (image_key, boxes, width, height, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(image_key) DO UPDATE SET
                boxes = excluded.boxes,
                width = excluded.width,
                height = excluded.height,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(image_key)
        .bind(boxes_json)
        .bind(entry.width.map(i64::from))
        .bind(entry.height.map(i64::from))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_labeled(&self, image_key: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO labeled_images (image_key) VALUES (?)")
            .bind(image_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_labeled(&self, image_key: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM labeled_images WHERE image_key = ?")
                .bind(image_key)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn labeled_images(&self) -> Result<Vec<String>> {
        let keys = sqlx::query_scalar("SELECT image_key FROM labeled_images ORDER BY image_key")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }
}
