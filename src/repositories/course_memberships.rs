use sqlx::PgPool;

use crate::db::types::{CourseRole, EnrollmentStatus};

/// Approved membership with the given role.
pub(crate) async fn has_approved_role(
    pool: &PgPool,
    user_id: &str,
    course_id: &str,
    role: CourseRole,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM course_memberships
            WHERE user_id = $1 AND course_id = $2 AND role = $3 AND status = $4
         )",
    )
    .bind(user_id)
    .bind(course_id)
    .bind(role)
    .bind(EnrollmentStatus::Approved)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
pub(crate) async fn upsert(
    pool: &PgPool,
    course_id: &str,
    user_id: &str,
    role: CourseRole,
    status: EnrollmentStatus,
    joined_at: time::PrimitiveDateTime,
) -> Result<String, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "INSERT INTO course_memberships (id, course_id, user_id, role, status, joined_at)
         VALUES ($1,$2,$3,$4,$5,$6)
         ON CONFLICT (course_id, user_id, role) DO UPDATE SET status = EXCLUDED.status
         RETURNING id",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(course_id)
    .bind(user_id)
    .bind(role)
    .bind(status)
    .bind(joined_at)
    .fetch_one(pool)
    .await
}
