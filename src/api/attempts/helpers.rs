use std::collections::HashMap;

use time::PrimitiveDateTime;

use crate::api::errors::ApiError;
use crate::core::metrics;
use crate::core::time::format_primitive;
use crate::db::models::{AnswerOption, Question, StudentAnswer, Test, TestAttempt};
use crate::repositories;
use crate::schemas::attempt::AnswerResponse;
use crate::services::grading::AnswerSubmission;
use crate::services::notifications::NotificationEvent;

pub(super) struct QuestionBank {
    pub(super) questions: Vec<Question>,
    pub(super) options: Vec<AnswerOption>,
}

impl QuestionBank {
    pub(super) fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == question_id)
    }
}

pub(super) async fn lock_attempt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: &str,
) -> Result<TestAttempt, ApiError> {
    repositories::attempts::lock_by_id(&mut **tx, attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))
}

pub(super) async fn fetch_test(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Test, ApiError> {
    repositories::tests::find_by_id(executor, test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))
}

pub(super) async fn load_bank(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    test_id: &str,
) -> Result<QuestionBank, ApiError> {
    let questions = repositories::questions::list_active(&mut **tx, test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_for_test(&mut **tx, test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answer options"))?;
    Ok(QuestionBank { questions, options })
}

pub(super) async fn load_answers(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<StudentAnswer>, ApiError> {
    repositories::answers::list_by_attempt(executor, attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))
}

pub(super) async fn user_name(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: Option<&str>,
) -> Result<Option<String>, ApiError> {
    let Some(user_id) = user_id else {
        return Ok(None);
    };
    repositories::users::find_name_by_id(executor, user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user name"))
}

/// Flips an overdue attempt to `timed_out`. Returns whether this call did it.
pub(super) async fn time_out(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt: &TestAttempt,
    now: PrimitiveDateTime,
) -> Result<bool, ApiError> {
    let changed = repositories::attempts::mark_timed_out(&mut **tx, &attempt.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to time out attempt"))?;

    if changed {
        metrics::attempts_timed_out(1);
        tracing::info!(
            attempt_id = %attempt.id,
            test_id = %attempt.test_id,
            student_id = %attempt.student_id,
            status = "timed_out",
            "Attempt timed out"
        );
    }
    Ok(changed)
}

pub(super) fn submissions(answers: &[StudentAnswer]) -> HashMap<String, AnswerSubmission> {
    answers
        .iter()
        .map(|answer| {
            (
                answer.question_id.clone(),
                AnswerSubmission {
                    selected_option_ids: answer.selected_option_ids.0.clone(),
                    text_answer: answer.text_answer.clone(),
                },
            )
        })
        .collect()
}

pub(super) fn answer_response(answer: &StudentAnswer) -> AnswerResponse {
    AnswerResponse {
        id: answer.id.clone(),
        attempt_id: answer.attempt_id.clone(),
        question_id: answer.question_id.clone(),
        selected_option_ids: answer.selected_option_ids.0.clone(),
        text_answer: answer.text_answer.clone(),
        answered_at: format_primitive(answer.answered_at),
        updated_at: format_primitive(answer.updated_at),
    }
}

pub(super) fn graded_event(attempt: &TestAttempt) -> NotificationEvent {
    NotificationEvent::AttemptGraded {
        attempt_id: attempt.id.clone(),
        test_id: attempt.test_id.clone(),
        student_id: attempt.student_id.clone(),
        score: attempt.score,
        max_score: attempt.max_score,
        percentage: attempt.percentage,
        passed: attempt.passed,
    }
}
