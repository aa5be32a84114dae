use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_course_role, CurrentUser};
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::{deadline_after, format_optional, format_primitive, primitive_now_utc};
use crate::db::types::{AttemptStatus, CourseRole};
use crate::repositories;
use crate::schemas::attempt::{
    AnswerResponse, SaveAnswerRequest, StartAttemptResponse, SubmitAttemptRequest,
    SubmitAttemptResponse,
};
use crate::services::attempt_policy::{
    check_open, ensure_startable, ensure_transition, plan_start, AttemptWindow, StartAction,
};
use crate::services::errors::AssessmentError;
use crate::services::grading::grade_attempt;
use crate::services::notifications::dispatch;
use crate::services::question_bank::{normalize_answer, GradableQuestion};
use crate::services::question_view::{build_question_view, ShuffleSettings};
use crate::services::results::{check_visibility, render_result, ResultInput, ViewerRole};

use super::helpers;

pub(crate) async fn start_attempt(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StartAttemptResponse>), ApiError> {
    let now = primitive_now_utc();
    let test = helpers::fetch_test(state.db(), &test_id).await?;
    ensure_startable(&test, now)?;
    require_course_role(&state, &user, &test.course_id, CourseRole::Student).await?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::attempts::lock_start(&mut *tx, &test.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock attempt start"))?;

    let in_progress = repositories::attempts::lock_in_progress(&mut *tx, &test.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;
    let finished = repositories::attempts::count_finished(&mut *tx, &test.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    let plan = plan_start(in_progress.as_ref(), finished, test.max_attempts, now);
    if let Some(overdue) = in_progress.as_ref().filter(|_| plan.expire.is_some()) {
        helpers::time_out(&mut tx, overdue, now).await?;
    }

    let (attempt, resumed) = match plan.action {
        StartAction::Resume(_) => {
            let Some(attempt) = in_progress else {
                return Err(ApiError::Conflict("Attempt is no longer in progress".to_string()));
            };
            (attempt, true)
        }
        StartAction::Create { attempt_number } => {
            let attempt_id = Uuid::new_v4().to_string();
            let created = repositories::attempts::create(
                &mut *tx,
                repositories::attempts::CreateAttempt {
                    id: &attempt_id,
                    test_id: &test.id,
                    student_id: &user.id,
                    attempt_number,
                    shuffle_seed: rand::random::<i32>(),
                    started_at: now,
                    expires_at: deadline_after(now, test.time_limit_minutes),
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

            let Some(attempt) = created else {
                return Err(ApiError::Conflict("An attempt is already in progress".to_string()));
            };
            (attempt, false)
        }
        StartAction::LimitReached => {
            // Keep the timeout of an overdue attempt even though nothing new starts.
            tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
            return Err(ApiError::BadRequest("Maximum number of attempts reached".to_string()));
        }
    };

    let bank = helpers::load_bank(&mut tx, &test.id).await?;
    let saved_answers = if resumed {
        helpers::load_answers(&mut *tx, &attempt.id).await?
    } else {
        Vec::new()
    };

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    if resumed {
        metrics::attempt_resumed();
    } else {
        metrics::attempt_started();
    }
    tracing::info!(
        attempt_id = %attempt.id,
        test_id = %test.id,
        student_id = %user.id,
        attempt_number = attempt.attempt_number,
        status = attempt.status.as_str(),
        resumed,
        "Attempt started"
    );

    let questions = build_question_view(
        bank.questions,
        bank.options,
        ShuffleSettings {
            shuffle_questions: test.shuffle_questions,
            shuffle_answers: test.shuffle_answers,
            seed: attempt.shuffle_seed,
        },
    );

    let status = if resumed { StatusCode::OK } else { StatusCode::CREATED };
    Ok((
        status,
        Json(StartAttemptResponse {
            attempt_id: attempt.id,
            test_id: test.id,
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            resumed,
            started_at: format_primitive(attempt.started_at),
            expires_at: format_optional(attempt.expires_at),
            time_limit_minutes: test.time_limit_minutes,
            questions,
            saved_answers: saved_answers.iter().map(helpers::answer_response).collect(),
        }),
    ))
}

pub(super) async fn save_answer(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt = helpers::lock_attempt(&mut tx, &attempt_id).await?;
    if check_open(&attempt, &user.id, now, 0)? == AttemptWindow::Expired {
        helpers::time_out(&mut tx, &attempt, now).await?;
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return Err(ApiError::BadRequest("Attempt time has expired".to_string()));
    }

    let question =
        repositories::questions::find_active(&mut *tx, &attempt.test_id, &payload.question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
            .ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Question {} is not part of this test",
                    payload.question_id
                ))
            })?;
    let options = repositories::questions::list_options(&mut *tx, &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answer options"))?;

    let normalized = normalize_answer(
        &question,
        &options,
        &payload.selected_option_ids,
        payload.text_answer.as_deref(),
    )?;

    let answer = repositories::answers::upsert(
        &mut *tx,
        repositories::answers::SaveAnswer {
            attempt_id: &attempt.id,
            question_id: &question.id,
            selected_option_ids: &normalized.selected_option_ids,
            text_answer: normalized.text_answer.as_deref(),
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::debug!(attempt_id = %attempt.id, question_id = %question.id, "Answer saved");
    Ok(Json(helpers::answer_response(&answer)))
}

pub(super) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<Json<SubmitAttemptResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = primitive_now_utc();
    let grace = state.settings().attempts().submit_grace_seconds;
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt = helpers::lock_attempt(&mut tx, &attempt_id).await?;
    if check_open(&attempt, &user.id, now, grace)? == AttemptWindow::Expired {
        helpers::time_out(&mut tx, &attempt, now).await?;
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return Err(ApiError::BadRequest("Attempt time has expired".to_string()));
    }
    ensure_transition(attempt.status, AttemptStatus::Submitted)?;

    let test = helpers::fetch_test(&mut *tx, &attempt.test_id).await?;
    let bank = helpers::load_bank(&mut tx, &test.id).await?;

    for item in &payload.answers {
        let question = bank.question(&item.question_id).ok_or_else(|| {
            AssessmentError::BadRequest(format!(
                "Question {} is not part of this test",
                item.question_id
            ))
        })?;
        let normalized = normalize_answer(
            question,
            &bank.options,
            &item.selected_option_ids,
            item.text_answer.as_deref(),
        )?;
        repositories::answers::upsert(
            &mut *tx,
            repositories::answers::SaveAnswer {
                attempt_id: &attempt.id,
                question_id: &question.id,
                selected_option_ids: &normalized.selected_option_ids,
                text_answer: normalized.text_answer.as_deref(),
                now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;
    }

    let gradable = bank
        .questions
        .iter()
        .map(|question| GradableQuestion::from_rows(question, &bank.options))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::internal(e, "Question bank is inconsistent"))?;
    let saved = helpers::load_answers(&mut *tx, &attempt.id).await?;
    let grade = grade_attempt(&gradable, &helpers::submissions(&saved), test.passing_score);

    for score in &grade.scores {
        repositories::answers::record_score(
            &mut *tx,
            repositories::answers::RecordScore {
                attempt_id: &attempt.id,
                question_id: &score.question_id,
                points_earned: score.points_earned,
                is_correct: score.is_correct,
                now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store answer score"))?;
    }

    let graded = grade.totals.is_final();
    let status = if graded { AttemptStatus::Graded } else { AttemptStatus::Submitted };
    let attempt = repositories::attempts::apply_grade(
        &mut *tx,
        repositories::attempts::GradeUpdate {
            id: &attempt.id,
            expected: AttemptStatus::InProgress,
            status,
            submitted_at: Some(now),
            graded_at: graded.then_some(now),
            score: grade.totals.score,
            max_score: grade.totals.max_score,
            percentage: grade.totals.percentage,
            passed: grade.totals.passed,
            feedback: None,
            graded_by: None,
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to submit attempt"))?
    .ok_or_else(|| ApiError::Conflict("Attempt was submitted concurrently".to_string()))?;

    let result = match check_visibility(ViewerRole::Student, &test, &attempt) {
        Ok(disclose) => {
            let answers = helpers::load_answers(&mut *tx, &attempt.id).await?;
            Some(render_result(
                ResultInput {
                    test: &test,
                    attempt: &attempt,
                    questions: &bank.questions,
                    options: &bank.options,
                    answers: &answers,
                    student_name: Some(user.full_name.clone()),
                    grader_name: None,
                },
                disclose,
            ))
        }
        Err(AssessmentError::NotAvailable(_)) => None,
        Err(err) => return Err(err.into()),
    };

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    metrics::attempt_submitted(attempt.status);
    tracing::info!(
        attempt_id = %attempt.id,
        test_id = %attempt.test_id,
        student_id = %attempt.student_id,
        status = attempt.status.as_str(),
        "Attempt submitted"
    );
    if graded {
        metrics::attempt_graded(metrics::GradeMode::Auto);
        tracing::info!(
            attempt_id = %attempt.id,
            test_id = %attempt.test_id,
            student_id = %attempt.student_id,
            status = attempt.status.as_str(),
            percentage = ?attempt.percentage,
            "Attempt auto-graded"
        );
        dispatch(state.notifier(), helpers::graded_event(&attempt));
    }

    Ok(Json(SubmitAttemptResponse {
        attempt_id: attempt.id,
        status: attempt.status,
        submitted_at: format_optional(attempt.submitted_at),
        results_available: result.is_some(),
        result,
    }))
}
