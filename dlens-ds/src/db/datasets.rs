//! Dataset records

use dlens_common::db::Dataset;
use sqlx::{SqliteExecutor, SqlitePool};

/// Insert a dataset; accepts a pool or an open transaction
pub async fn create_dataset<'e, E>(
    executor: E,
    project_id: i64,
    name: &str,
    status: &str,
) -> sqlx::Result<Dataset>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Dataset>(
        r#"
        INSERT INTO datasets (project_id, name, status)
        VALUES (?, ?, ?)
        RETURNING id, project_id, name, status, created_at
        "#,
    )
    .bind(project_id)
    .bind(name)
    .bind(status)
    .fetch_one(executor)
    .await
}

pub async fn find_dataset(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Dataset>> {
    sqlx::query_as::<_, Dataset>(
        "SELECT id, project_id, name, status, created_at FROM datasets WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Datasets of a project, newest first
pub async fn list_project_datasets(
    pool: &SqlitePool,
    project_id: i64,
) -> sqlx::Result<Vec<Dataset>> {
    sqlx::query_as::<_, Dataset>(
        r#"
        SELECT id, project_id, name, status, created_at
        FROM datasets
        WHERE project_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
}
