use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_test_owner, CurrentUser};
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{AttemptResultResponse, GradeAttemptRequest};
use crate::services::manual_grading::{merge_grades, GradedAnswer, ManualGrade};
use crate::services::notifications::dispatch;
use crate::services::results::{build_result, render_result, viewer_role, ResultInput};

use super::helpers;

pub(super) async fn get_result(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt = repositories::attempts::find_by_id(&mut *tx, &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;
    let test = helpers::fetch_test(&mut *tx, &attempt.test_id).await?;
    viewer_role(&attempt, &test, &user.id)?;

    let bank = helpers::load_bank(&mut tx, &test.id).await?;
    let answers = helpers::load_answers(&mut *tx, &attempt.id).await?;
    let student_name = helpers::user_name(&mut *tx, Some(attempt.student_id.as_str())).await?;
    let grader_name = helpers::user_name(&mut *tx, attempt.graded_by.as_deref()).await?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let result = build_result(
        ResultInput {
            test: &test,
            attempt: &attempt,
            questions: &bank.questions,
            options: &bank.options,
            answers: &answers,
            student_name,
            grader_name,
        },
        &user.id,
    )?;

    Ok(Json(result))
}

pub(super) async fn grade_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GradeAttemptRequest>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt = helpers::lock_attempt(&mut tx, &attempt_id).await?;
    let test = helpers::fetch_test(&mut *tx, &attempt.test_id).await?;
    require_test_owner(&test, &user)?;

    let bank = helpers::load_bank(&mut tx, &test.id).await?;
    let points: HashMap<&str, rust_decimal::Decimal> = bank
        .questions
        .iter()
        .map(|question| (question.id.as_str(), question.points))
        .collect();
    let stored = helpers::load_answers(&mut *tx, &attempt.id).await?;
    let current: Vec<GradedAnswer> = stored
        .iter()
        .filter_map(|answer| {
            points.get(answer.question_id.as_str()).map(|question_points| GradedAnswer {
                answer_id: answer.id.clone(),
                question_points: *question_points,
                points_earned: answer.points_earned,
                is_correct: answer.is_correct,
                feedback: answer.feedback.clone(),
            })
        })
        .collect();

    let grades: Vec<ManualGrade> = payload
        .grades
        .iter()
        .map(|grade| ManualGrade {
            answer_id: grade.answer_id.clone(),
            points_earned: grade.points_earned,
            feedback: grade.feedback.clone(),
        })
        .collect();

    let outcome = merge_grades(attempt.status, current, &grades, test.passing_score)?;

    let touched =
        outcome.answers.iter().filter(|answer| outcome.changed.contains(&answer.answer_id));
    for answer in touched {
        let (Some(points_earned), Some(is_correct)) = (answer.points_earned, answer.is_correct)
        else {
            continue;
        };
        let updated = repositories::answers::apply_manual_score(
            &mut *tx,
            repositories::answers::ManualScore {
                attempt_id: &attempt.id,
                answer_id: &answer.answer_id,
                points_earned,
                is_correct,
                feedback: answer.feedback.as_deref(),
                now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store manual grade"))?;
        if !updated {
            return Err(ApiError::NotFound(format!("Answer {} not found", answer.answer_id)));
        }
    }

    let graded = outcome.status == AttemptStatus::Graded;
    let attempt = repositories::attempts::apply_grade(
        &mut *tx,
        repositories::attempts::GradeUpdate {
            id: &attempt.id,
            expected: AttemptStatus::Submitted,
            status: outcome.status,
            submitted_at: None,
            graded_at: graded.then_some(now),
            score: outcome.totals.score,
            max_score: outcome.totals.max_score,
            percentage: outcome.totals.percentage,
            passed: outcome.totals.passed,
            feedback: payload.feedback.as_deref(),
            graded_by: Some(user.id.as_str()),
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to grade attempt"))?
    .ok_or_else(|| ApiError::Conflict("Attempt was graded concurrently".to_string()))?;

    let answers = helpers::load_answers(&mut *tx, &attempt.id).await?;
    let student_name = helpers::user_name(&mut *tx, Some(attempt.student_id.as_str())).await?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        attempt_id = %attempt.id,
        test_id = %attempt.test_id,
        student_id = %attempt.student_id,
        graded_by = %user.id,
        status = attempt.status.as_str(),
        graded_answers = outcome.changed.len(),
        "Attempt manually graded"
    );
    if graded {
        metrics::attempt_graded(metrics::GradeMode::Manual);
        dispatch(state.notifier(), helpers::graded_event(&attempt));
    }

    let result = render_result(
        ResultInput {
            test: &test,
            attempt: &attempt,
            questions: &bank.questions,
            options: &bank.options,
            answers: &answers,
            student_name,
            grader_name: Some(user.full_name.clone()),
        },
        true,
    );

    Ok(Json(result))
}
