//! Project lookups

use dlens_common::db::Project;
use sqlx::SqlitePool;

pub async fn find_project(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT id, name, created_at FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Insert a project and return the stored row
pub async fn create_project(pool: &SqlitePool, name: &str) -> sqlx::Result<Project> {
    sqlx::query_as::<_, Project>(
        "INSERT INTO projects (name) VALUES (?) RETURNING id, name, created_at",
    )
    .bind(name)
    .fetch_one(pool)
    .await
}
