//! Image metadata rows

use dlens_common::db::ImageRecord;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

const IMAGE_COLUMNS: &str =
    "id, project_id, original_url, filename, size, mimetype, dataset_id, created_at";

/// Fields supplied when registering an uploaded image
#[derive(Debug, Clone)]
pub struct NewImage {
    pub project_id: i64,
    pub original_url: String,
    pub filename: String,
    pub size: Option<i64>,
    pub mimetype: Option<String>,
}

pub async fn insert_image(pool: &SqlitePool, image: &NewImage) -> sqlx::Result<ImageRecord> {
    let sql = format!(
        r#"
        INSERT INTO images (project_id, original_url, filename, size, mimetype)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        IMAGE_COLUMNS
    );
    sqlx::query_as::<_, ImageRecord>(&sql)
        .bind(image.project_id)
        .bind(&image.original_url)
        .bind(&image.filename)
        .bind(image.size)
        .bind(&image.mimetype)
        .fetch_one(pool)
        .await
}

pub async fn find_image(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<ImageRecord>> {
    let sql = format!("SELECT {} FROM images WHERE id = ?", IMAGE_COLUMNS);
    sqlx::query_as::<_, ImageRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Images of a project, newest first
pub async fn list_project_images(
    pool: &SqlitePool,
    project_id: i64,
) -> sqlx::Result<Vec<ImageRecord>> {
    let sql = format!(
        "SELECT {} FROM images WHERE project_id = ? ORDER BY created_at DESC, id DESC",
        IMAGE_COLUMNS
    );
    sqlx::query_as::<_, ImageRecord>(&sql)
        .bind(project_id)
        .fetch_all(pool)
        .await
}

/// Point every existing image in `image_ids` at `dataset_id`
///
/// Ids with no matching row are skipped. Returns the number of rows updated.
pub async fn update_images_dataset_id<'e, E>(
    executor: E,
    image_ids: &[i64],
    dataset_id: i64,
) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    if image_ids.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE images SET dataset_id = ");
    builder.push_bind(dataset_id);
    builder.push(" WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in image_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}
