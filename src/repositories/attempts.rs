use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::TestAttempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, test_id, student_id, attempt_number, shuffle_seed, status, started_at, \
    expires_at, submitted_at, graded_at, score, max_score, percentage, passed, \
    feedback, graded_by, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) attempt_number: i32,
    pub(crate) shuffle_seed: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) expires_at: Option<PrimitiveDateTime>,
}

/// Attempt row joined with the student's display name.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AttemptWithStudent {
    #[sqlx(flatten)]
    pub(crate) attempt: TestAttempt,
    pub(crate) student_name: Option<String>,
}

/// Serializes start requests of one student for one test until the transaction ends.
pub(crate) async fn lock_start(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    student_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("test_attempt:{test_id}:{student_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

/// `None` when an in-progress attempt or the same attempt number already exists.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAttempt<'_>,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "INSERT INTO test_attempts (
            id, test_id, student_id, attempt_number, shuffle_seed, status,
            started_at, expires_at, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$7,$7)
        ON CONFLICT DO NOTHING
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.test_id)
    .bind(params.student_id)
    .bind(params.attempt_number)
    .bind(params.shuffle_seed)
    .bind(AttemptStatus::InProgress)
    .bind(params.started_at)
    .bind(params.expires_at)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!("SELECT {COLUMNS} FROM test_attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn lock_in_progress(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    student_id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts
         WHERE test_id = $1 AND student_id = $2 AND status = $3
         FOR UPDATE"
    ))
    .bind(test_id)
    .bind(student_id)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn count_finished(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    student_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM test_attempts
         WHERE test_id = $1 AND student_id = $2 AND status <> $3",
    )
    .bind(test_id)
    .bind(student_id)
    .bind(AttemptStatus::InProgress)
    .fetch_one(executor)
    .await
}

/// Compare-and-swap to `timed_out`; `false` when the attempt was no longer in progress.
pub(crate) async fn mark_timed_out(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE test_attempts SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(AttemptStatus::TimedOut)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Times out every in-progress attempt whose deadline lies strictly before `cutoff`.
pub(crate) async fn expire_overdue(
    executor: impl sqlx::PgExecutor<'_>,
    cutoff: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE test_attempts SET status = $1, updated_at = $2
         WHERE status = $3 AND expires_at IS NOT NULL AND expires_at < $4",
    )
    .bind(AttemptStatus::TimedOut)
    .bind(now)
    .bind(AttemptStatus::InProgress)
    .bind(cutoff)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) struct GradeUpdate<'a> {
    pub(crate) id: &'a str,
    pub(crate) expected: AttemptStatus,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) score: Decimal,
    pub(crate) max_score: Decimal,
    pub(crate) percentage: Option<Decimal>,
    pub(crate) passed: Option<bool>,
    pub(crate) feedback: Option<&'a str>,
    pub(crate) graded_by: Option<&'a str>,
    pub(crate) now: PrimitiveDateTime,
}

/// Writes grading results if the attempt is still in `expected`; `None` otherwise.
/// Absent `submitted_at`, `feedback` and `graded_by` keep their stored values.
pub(crate) async fn apply_grade(
    executor: impl sqlx::PgExecutor<'_>,
    params: GradeUpdate<'_>,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "UPDATE test_attempts
         SET status = $1,
             submitted_at = COALESCE($2, submitted_at),
             graded_at = $3,
             score = $4,
             max_score = $5,
             percentage = $6,
             passed = $7,
             feedback = COALESCE($8, feedback),
             graded_by = COALESCE($9, graded_by),
             updated_at = $10
         WHERE id = $11 AND status = $12
         RETURNING {COLUMNS}",
    ))
    .bind(params.status)
    .bind(params.submitted_at)
    .bind(params.graded_at)
    .bind(params.score)
    .bind(params.max_score)
    .bind(params.percentage)
    .bind(params.passed)
    .bind(params.feedback)
    .bind(params.graded_by)
    .bind(params.now)
    .bind(params.id)
    .bind(params.expected)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_by_test(
    pool: &PgPool,
    test_id: &str,
    status: Option<AttemptStatus>,
    skip: i64,
    limit: i64,
) -> Result<Vec<AttemptWithStudent>, sqlx::Error> {
    let columns = COLUMNS
        .split(',')
        .map(|column| format!("a.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {columns}, u.full_name AS student_name
         FROM test_attempts a
         LEFT JOIN users u ON u.id = a.student_id
         WHERE a.test_id = "
    ));
    builder.push_bind(test_id);
    if let Some(status) = status {
        builder.push(" AND a.status = ").push_bind(status);
    }
    builder.push(" ORDER BY a.started_at DESC, a.id OFFSET ").push_bind(skip);
    builder.push(" LIMIT ").push_bind(limit);

    builder.build_query_as::<AttemptWithStudent>().fetch_all(pool).await
}

pub(crate) async fn count_by_test(
    pool: &PgPool,
    test_id: &str,
    status: Option<AttemptStatus>,
) -> Result<i64, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM test_attempts WHERE test_id = ");
    builder.push_bind(test_id);
    if let Some(status) = status {
        builder.push(" AND status = ").push_bind(status);
    }
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Submitted and graded attempts of a test.
pub(crate) async fn list_completed(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Vec<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts
         WHERE test_id = $1 AND status IN ($2, $3)
         ORDER BY started_at"
    ))
    .bind(test_id)
    .bind(AttemptStatus::Submitted)
    .bind(AttemptStatus::Graded)
    .fetch_all(executor)
    .await
}
