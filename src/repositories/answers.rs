use rust_decimal::Decimal;
use sqlx::types::Json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::StudentAnswer;

const COLUMNS: &str = "\
    id, attempt_id, question_id, selected_option_ids, text_answer, points_earned, \
    is_correct, feedback, answered_at, updated_at";

pub(crate) struct SaveAnswer<'a> {
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) selected_option_ids: &'a [String],
    pub(crate) text_answer: Option<&'a str>,
    pub(crate) now: PrimitiveDateTime,
}

/// One row per (attempt, question); later saves overwrite the payload.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: SaveAnswer<'_>,
) -> Result<StudentAnswer, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "INSERT INTO student_answers (
            id, attempt_id, question_id, selected_option_ids, text_answer, answered_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$6)
        ON CONFLICT (attempt_id, question_id) DO UPDATE
        SET selected_option_ids = EXCLUDED.selected_option_ids,
            text_answer = EXCLUDED.text_answer,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(Json(params.selected_option_ids.to_vec()))
    .bind(params.text_answer)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {COLUMNS} FROM student_answers WHERE attempt_id = $1 ORDER BY answered_at, id"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) struct RecordScore<'a> {
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) points_earned: Option<Decimal>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) now: PrimitiveDateTime,
}

/// Stores auto-grading output, creating an empty answer for unanswered questions.
pub(crate) async fn record_score(
    executor: impl sqlx::PgExecutor<'_>,
    params: RecordScore<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO student_answers (
            id, attempt_id, question_id, selected_option_ids, points_earned, is_correct,
            answered_at, updated_at
        ) VALUES ($1,$2,$3,'[]'::jsonb,$4,$5,$6,$6)
        ON CONFLICT (attempt_id, question_id) DO UPDATE
        SET points_earned = EXCLUDED.points_earned,
            is_correct = EXCLUDED.is_correct,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(params.points_earned)
    .bind(params.is_correct)
    .bind(params.now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) struct ManualScore<'a> {
    pub(crate) attempt_id: &'a str,
    pub(crate) answer_id: &'a str,
    pub(crate) points_earned: Decimal,
    pub(crate) is_correct: bool,
    pub(crate) feedback: Option<&'a str>,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn apply_manual_score(
    executor: impl sqlx::PgExecutor<'_>,
    params: ManualScore<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE student_answers
         SET points_earned = $1, is_correct = $2, feedback = $3, updated_at = $4
         WHERE attempt_id = $5 AND id = $6",
    )
    .bind(params.points_earned)
    .bind(params.is_correct)
    .bind(params.feedback)
    .bind(params.now)
    .bind(params.attempt_id)
    .bind(params.answer_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}
