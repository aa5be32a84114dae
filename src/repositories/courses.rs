use sqlx::PgPool;

use crate::db::models::Course;

const COLUMNS: &str = "id, title, created_by, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

#[cfg(test)]
pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    title: &str,
    created_by: &str,
    now: time::PrimitiveDateTime,
) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (id, title, created_by, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$4)
         RETURNING {COLUMNS}",
    ))
    .bind(id)
    .bind(title)
    .bind(created_by)
    .bind(now)
    .fetch_one(pool)
    .await
}
