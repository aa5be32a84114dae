use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_test_owner, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::TestStatus;
use crate::repositories;
use crate::schemas::test::{TestResponse, TestUpdate};
use crate::services::notifications::{dispatch, NotificationEvent};
use crate::services::question_bank::GradableQuestion;

use super::super::helpers;

pub(in crate::api::authoring) async fn get_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TestResponse>, ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test = helpers::fetch_test(&mut *tx, &test_id).await?;
    require_test_owner(&test, &user)?;
    let response = helpers::load_test_response(&mut tx, test).await?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
    Ok(Json(response))
}

pub(in crate::api::authoring) async fn update_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<TestUpdate>,
) -> Result<Json<TestResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let mut test = helpers::lock_test(&mut tx, &test_id).await?;
    require_test_owner(&test, &user)?;

    if test.status != TestStatus::Draft && payload.touches_scoring() {
        return Err(ApiError::BadRequest(format!(
            "Only title, instructions, availability and result visibility can change once a \
             test is {}",
            test.status.as_str()
        )));
    }

    if let Some(title) = payload.title {
        test.title = title.trim().to_string();
    }
    if let Some(instructions) = payload.instructions {
        test.instructions = Some(instructions);
    }
    if let Some(value) = payload.time_limit_minutes {
        test.time_limit_minutes = value;
    }
    if let Some(value) = payload.max_attempts {
        test.max_attempts = value;
    }
    if let Some(value) = payload.passing_score {
        test.passing_score = value;
    }
    if let Some(value) = payload.shuffle_questions {
        test.shuffle_questions = value;
    }
    if let Some(value) = payload.shuffle_answers {
        test.shuffle_answers = value;
    }
    if let Some(value) = payload.show_results_immediately {
        test.show_results_immediately = value;
    }
    if let Some(value) = payload.show_correct_answers {
        test.show_correct_answers = value;
    }
    if let Some(value) = payload.available_from {
        test.available_from = value;
    }
    if let Some(value) = payload.available_until {
        test.available_until = value;
    }
    helpers::ensure_window(&test)?;
    test.updated_at = primitive_now_utc();

    let test = repositories::tests::update(&mut *tx, &test)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update test"))?;
    let response = helpers::load_test_response(&mut tx, test).await?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(test_id = %response.id, "Test updated");
    Ok(Json(response))
}

pub(in crate::api::authoring) async fn publish_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TestResponse>, ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test = helpers::lock_test(&mut tx, &test_id).await?;
    require_test_owner(&test, &user)?;

    if test.status != TestStatus::Draft {
        return Err(ApiError::BadRequest(format!(
            "Only draft tests can be published (status: {})",
            test.status.as_str()
        )));
    }

    let questions = repositories::questions::list_active(&mut *tx, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    if questions.is_empty() {
        return Err(ApiError::BadRequest(
            "A test needs at least one question before it can be published".to_string(),
        ));
    }
    let options = repositories::questions::list_options_for_test(&mut *tx, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answer options"))?;
    for question in &questions {
        GradableQuestion::from_rows(question, &options).map_err(|e| {
            ApiError::BadRequest(format!("Question {} is invalid: {e}", question.id))
        })?;
    }

    let now = primitive_now_utc();
    let test = repositories::tests::transition_status(
        &mut *tx,
        &test.id,
        TestStatus::Draft,
        TestStatus::Published,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to publish test"))?
    .ok_or_else(|| ApiError::Conflict("Test was modified concurrently".to_string()))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        test_id = %test.id,
        course_id = %test.course_id,
        status = test.status.as_str(),
        "Test published"
    );
    dispatch(
        state.notifier(),
        NotificationEvent::TestPublished {
            test_id: test.id.clone(),
            course_id: test.course_id.clone(),
            title: test.title.clone(),
        },
    );

    Ok(Json(helpers::test_response(test, questions, &options)))
}

pub(in crate::api::authoring) async fn close_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TestResponse>, ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test = helpers::lock_test(&mut tx, &test_id).await?;
    require_test_owner(&test, &user)?;

    if test.status != TestStatus::Published {
        return Err(ApiError::BadRequest(format!(
            "Only published tests can be closed (status: {})",
            test.status.as_str()
        )));
    }

    let test = repositories::tests::transition_status(
        &mut *tx,
        &test.id,
        TestStatus::Published,
        TestStatus::Closed,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to close test"))?
    .ok_or_else(|| ApiError::Conflict("Test was modified concurrently".to_string()))?;

    let response = helpers::load_test_response(&mut tx, test).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(test_id = %response.id, status = response.status.as_str(), "Test closed");
    Ok(Json(response))
}
