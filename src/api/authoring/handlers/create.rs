use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_course_role, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::CourseRole;
use crate::repositories;
use crate::schemas::test::{TestCreate, TestResponse};

use super::super::helpers;

pub(in crate::api::authoring) async fn create_test(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<TestCreate>,
) -> Result<(StatusCode, Json<TestResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let course = repositories::courses::find_by_id(state.db(), &payload.course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?;
    if course.is_none() {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    require_course_role(&state, &user, &payload.course_id, CourseRole::Teacher).await?;

    if let (Some(from), Some(until)) = (payload.available_from, payload.available_until) {
        if until <= from {
            return Err(ApiError::BadRequest(
                "available_until must be after available_from".to_string(),
            ));
        }
    }
    for question in &payload.questions {
        helpers::check_question(question)?;
    }
    let total_points = payload.questions.iter().map(|question| question.points).sum();
    helpers::ensure_points_budget(total_points)?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test_id = Uuid::new_v4().to_string();
    let test = repositories::tests::create(
        &mut *tx,
        repositories::tests::CreateTest {
            id: &test_id,
            course_id: &payload.course_id,
            title: payload.title.trim(),
            instructions: payload.instructions.as_deref(),
            time_limit_minutes: payload.time_limit_minutes,
            max_attempts: payload.max_attempts,
            passing_score: payload.passing_score,
            shuffle_questions: payload.shuffle_questions,
            shuffle_answers: payload.shuffle_answers,
            show_results_immediately: payload.show_results_immediately,
            show_correct_answers: payload.show_correct_answers,
            available_from: payload.available_from,
            available_until: payload.available_until,
            created_by: &user.id,
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create test"))?;

    for (index, question) in payload.questions.iter().enumerate() {
        let order_index = question.order_index.unwrap_or(index as i32);
        helpers::insert_question(&mut tx, &test.id, question, order_index, now).await?;
    }

    let response = helpers::load_test_response(&mut tx, test).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        test_id = %response.id,
        course_id = %response.course_id,
        questions = response.questions.len(),
        "Test created"
    );

    Ok((StatusCode::CREATED, Json(response)))
}
