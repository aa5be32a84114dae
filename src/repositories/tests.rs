use rust_decimal::Decimal;
use time::PrimitiveDateTime;

use crate::db::models::Test;
use crate::db::types::TestStatus;

const COLUMNS: &str = "\
    id, course_id, title, instructions, time_limit_minutes, max_attempts, passing_score, \
    shuffle_questions, shuffle_answers, show_results_immediately, show_correct_answers, \
    available_from, available_until, status, created_by, created_at, updated_at, published_at";

pub(crate) struct CreateTest<'a> {
    pub(crate) id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) instructions: Option<&'a str>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) max_attempts: i32,
    pub(crate) passing_score: Decimal,
    pub(crate) shuffle_questions: bool,
    pub(crate) shuffle_answers: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) show_correct_answers: bool,
    pub(crate) available_from: Option<PrimitiveDateTime>,
    pub(crate) available_until: Option<PrimitiveDateTime>,
    pub(crate) created_by: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateTest<'_>,
) -> Result<Test, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!(
        "INSERT INTO tests (
            id, course_id, title, instructions, time_limit_minutes, max_attempts,
            passing_score, shuffle_questions, shuffle_answers, show_results_immediately,
            show_correct_answers, available_from, available_until, status, created_by,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$16)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.title)
    .bind(params.instructions)
    .bind(params.time_limit_minutes)
    .bind(params.max_attempts)
    .bind(params.passing_score)
    .bind(params.shuffle_questions)
    .bind(params.shuffle_answers)
    .bind(params.show_results_immediately)
    .bind(params.show_correct_answers)
    .bind(params.available_from)
    .bind(params.available_until)
    .bind(TestStatus::Draft)
    .bind(params.created_by)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Test>, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!("SELECT {COLUMNS} FROM tests WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Test>, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!("SELECT {COLUMNS} FROM tests WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Writes every editable column from `test`.
pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    test: &Test,
) -> Result<Test, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!(
        "UPDATE tests
         SET title = $1,
             instructions = $2,
             time_limit_minutes = $3,
             max_attempts = $4,
             passing_score = $5,
             shuffle_questions = $6,
             shuffle_answers = $7,
             show_results_immediately = $8,
             show_correct_answers = $9,
             available_from = $10,
             available_until = $11,
             updated_at = $12
         WHERE id = $13
         RETURNING {COLUMNS}",
    ))
    .bind(&test.title)
    .bind(&test.instructions)
    .bind(test.time_limit_minutes)
    .bind(test.max_attempts)
    .bind(test.passing_score)
    .bind(test.shuffle_questions)
    .bind(test.shuffle_answers)
    .bind(test.show_results_immediately)
    .bind(test.show_correct_answers)
    .bind(test.available_from)
    .bind(test.available_until)
    .bind(test.updated_at)
    .bind(&test.id)
    .fetch_one(executor)
    .await
}

/// Moves the test from `from` to `to`; `None` when it was not in `from`.
pub(crate) async fn transition_status(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    from: TestStatus,
    to: TestStatus,
    now: PrimitiveDateTime,
) -> Result<Option<Test>, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!(
        "UPDATE tests
         SET status = $1,
             published_at = CASE WHEN $1 = 'published'::teststatus THEN $2 ELSE published_at END,
             updated_at = $2
         WHERE id = $3 AND status = $4
         RETURNING {COLUMNS}",
    ))
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(from)
    .fetch_optional(executor)
    .await
}
