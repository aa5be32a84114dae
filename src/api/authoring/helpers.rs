use rust_decimal::Decimal;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::core::time::{format_optional, format_primitive};
use crate::db::models::{AnswerOption, Question, Test};
use crate::db::types::TestStatus;
use crate::repositories;
use crate::repositories::questions::NewOption;
use crate::schemas::test::{
    AnswerOptionCreate, AnswerOptionResponse, QuestionCreate, QuestionResponse, TestResponse,
};
use crate::services::question_bank::{validate_question, OptionDraft};

pub(super) async fn fetch_test(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Test, ApiError> {
    repositories::tests::find_by_id(executor, test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))
}

pub(super) async fn lock_test(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    test_id: &str,
) -> Result<Test, ApiError> {
    repositories::tests::lock_by_id(&mut **tx, test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))
}

pub(super) fn ensure_draft(test: &Test) -> Result<(), ApiError> {
    if test.status == TestStatus::Draft {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Questions can only be changed while the test is a draft (status: {})",
            test.status.as_str()
        )))
    }
}

pub(super) fn ensure_window(test: &Test) -> Result<(), ApiError> {
    if let (Some(from), Some(until)) = (test.available_from, test.available_until) {
        if until <= from {
            return Err(ApiError::BadRequest(
                "available_until must be after available_from".to_string(),
            ));
        }
    }
    Ok(())
}

/// Upper bound on a test's total points; attempt scores are stored as NUMERIC(10,2).
pub(super) const MAX_TEST_POINTS: i64 = 1_000_000;

pub(super) fn ensure_points_budget(total: Decimal) -> Result<(), ApiError> {
    if total > Decimal::from(MAX_TEST_POINTS) {
        return Err(ApiError::BadRequest(format!(
            "A test may carry at most {MAX_TEST_POINTS} points in total (requested {total})"
        )));
    }
    Ok(())
}

pub(super) async fn active_points(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Decimal, ApiError> {
    repositories::questions::total_active_points(executor, test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to sum question points"))
}

pub(super) fn option_drafts(options: &[AnswerOptionCreate]) -> Vec<OptionDraft<'_>> {
    options
        .iter()
        .map(|option| OptionDraft { text: &option.text, is_correct: option.is_correct })
        .collect()
}

pub(super) fn new_options(options: &[AnswerOptionCreate]) -> Vec<NewOption> {
    options
        .iter()
        .map(|option| NewOption {
            text: option.text.trim().to_string(),
            is_correct: option.is_correct,
        })
        .collect()
}

pub(super) fn check_question(payload: &QuestionCreate) -> Result<(), ApiError> {
    validate_question(
        payload.question_type,
        payload.points,
        &option_drafts(&payload.options),
        payload.acceptable_answers.as_deref(),
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub(super) async fn insert_question(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    test_id: &str,
    payload: &QuestionCreate,
    order_index: i32,
    now: time::PrimitiveDateTime,
) -> Result<(Question, Vec<AnswerOption>), ApiError> {
    let question_id = Uuid::new_v4().to_string();
    let question = repositories::questions::create(
        &mut **tx,
        repositories::questions::CreateQuestion {
            id: &question_id,
            test_id,
            question_type: payload.question_type,
            prompt: &payload.prompt,
            points: payload.points,
            order_index,
            explanation: payload.explanation.as_deref(),
            acceptable_answers: payload.acceptable_answers.as_deref(),
            case_sensitive: payload.case_sensitive,
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    let options = repositories::questions::insert_options(
        &mut **tx,
        &question.id,
        &new_options(&payload.options),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create answer options"))?;

    Ok((question, options))
}

pub(super) fn question_response(question: Question, options: &[AnswerOption]) -> QuestionResponse {
    let mut own: Vec<&AnswerOption> =
        options.iter().filter(|option| option.question_id == question.id).collect();
    own.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));

    QuestionResponse {
        options: own
            .into_iter()
            .map(|option| AnswerOptionResponse {
                id: option.id.clone(),
                text: option.text.clone(),
                order_index: option.order_index,
                is_correct: option.is_correct,
            })
            .collect(),
        id: question.id,
        question_type: question.question_type,
        prompt: question.prompt,
        points: question.points,
        order_index: question.order_index,
        explanation: question.explanation,
        acceptable_answers: question.acceptable_answers,
        case_sensitive: question.case_sensitive,
    }
}

pub(super) fn test_response(
    test: Test,
    questions: Vec<Question>,
    options: &[AnswerOption],
) -> TestResponse {
    let total_points: Decimal = questions.iter().map(|question| question.points).sum();
    let questions =
        questions.into_iter().map(|question| question_response(question, options)).collect();

    TestResponse {
        id: test.id,
        course_id: test.course_id,
        title: test.title,
        instructions: test.instructions,
        time_limit_minutes: test.time_limit_minutes,
        max_attempts: test.max_attempts,
        passing_score: test.passing_score,
        shuffle_questions: test.shuffle_questions,
        shuffle_answers: test.shuffle_answers,
        show_results_immediately: test.show_results_immediately,
        show_correct_answers: test.show_correct_answers,
        available_from: format_optional(test.available_from),
        available_until: format_optional(test.available_until),
        status: test.status,
        created_by: test.created_by,
        created_at: format_primitive(test.created_at),
        updated_at: format_primitive(test.updated_at),
        published_at: format_optional(test.published_at),
        total_points,
        questions,
    }
}

/// Loads the active question bank of a test and renders the author view.
pub(super) async fn load_test_response(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    test: Test,
) -> Result<TestResponse, ApiError> {
    let questions = repositories::questions::list_active(&mut **tx, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_for_test(&mut **tx, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answer options"))?;

    Ok(test_response(test, questions, &options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::QuestionType;
    use crate::services::attempt_policy::fixtures::test;
    use crate::services::question_bank::fixtures::{option, question};
    use time::macros::datetime;

    #[test]
    fn author_view_includes_answer_key_and_total_points() {
        let questions = vec![
            question("q1", QuestionType::MultipleChoice, 2),
            question("q2", QuestionType::Essay, 5),
        ];
        let options = vec![option("q1", "b", false), option("q1", "a", true)];

        let response = test_response(test(), questions, &options);

        assert_eq!(response.total_points, Decimal::from(7));
        assert_eq!(response.questions.len(), 2);
        let first = &response.questions[0];
        assert_eq!(first.options.len(), 2);
        assert!(first.options.iter().any(|option| option.id == "a" && option.is_correct));
        assert!(response.questions[1].options.is_empty());
    }

    #[test]
    fn total_points_are_capped() {
        assert!(ensure_points_budget(Decimal::from(MAX_TEST_POINTS)).is_ok());
        assert!(matches!(
            ensure_points_budget(Decimal::from(MAX_TEST_POINTS) + Decimal::new(1, 2)),
            Err(ApiError::BadRequest(_))
        ));
        // 150 questions at the per-question maximum would overflow the attempt score column.
        let many = Decimal::new(99_999_999, 2) * Decimal::from(150);
        assert!(matches!(ensure_points_budget(many), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn inverted_availability_window_is_rejected() {
        let mut inverted = test();
        inverted.available_from = Some(datetime!(2025-03-02 10:00));
        inverted.available_until = Some(datetime!(2025-03-01 10:00));
        assert!(matches!(ensure_window(&inverted), Err(ApiError::BadRequest(_))));

        let mut open = test();
        open.available_from = None;
        open.available_until = None;
        assert!(ensure_window(&open).is_ok());
    }

    #[test]
    fn published_tests_reject_question_edits() {
        let mut published = test();
        published.status = TestStatus::Published;
        assert!(matches!(ensure_draft(&published), Err(ApiError::BadRequest(_))));

        published.status = TestStatus::Draft;
        assert!(ensure_draft(&published).is_ok());
    }
}
