use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_test_owner, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::test::{QuestionCreate, QuestionResponse, QuestionUpdate};
use crate::services::question_bank::{validate_question, OptionDraft};

use super::super::helpers;

pub(in crate::api::authoring) async fn add_question(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test = helpers::lock_test(&mut tx, &test_id).await?;
    require_test_owner(&test, &user)?;
    helpers::ensure_draft(&test)?;
    helpers::check_question(&payload)?;
    let current = helpers::active_points(&mut *tx, &test.id).await?;
    helpers::ensure_points_budget(current + payload.points)?;

    let order_index = match payload.order_index {
        Some(value) => value,
        None => repositories::questions::next_order_index(&mut *tx, &test.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to compute question order"))?,
    };

    let (question, options) =
        helpers::insert_question(&mut tx, &test.id, &payload, order_index, primitive_now_utc())
            .await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(test_id = %test.id, question_id = %question.id, "Question added");
    Ok((StatusCode::CREATED, Json(helpers::question_response(question, &options))))
}

pub(in crate::api::authoring) async fn update_question(
    Path((test_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test = helpers::lock_test(&mut tx, &test_id).await?;
    require_test_owner(&test, &user)?;
    helpers::ensure_draft(&test)?;

    let mut question = repositories::questions::find_active(&mut *tx, &test.id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;
    let existing = repositories::questions::list_options(&mut *tx, &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answer options"))?;

    if let Some(value) = payload.question_type {
        question.question_type = value;
    }
    if let Some(value) = payload.prompt {
        question.prompt = value;
    }
    if let Some(value) = payload.points {
        let current = helpers::active_points(&mut *tx, &test.id).await?;
        helpers::ensure_points_budget(current - question.points + value)?;
        question.points = value;
    }
    if let Some(value) = payload.order_index {
        question.order_index = value;
    }
    if let Some(value) = payload.explanation {
        question.explanation = Some(value);
    }
    if let Some(value) = payload.acceptable_answers {
        question.acceptable_answers = Some(value);
    }
    if let Some(value) = payload.case_sensitive {
        question.case_sensitive = value;
    }

    // Options are dropped when the question no longer uses them.
    let replacement = match payload.options {
        Some(options) => Some(helpers::new_options(&options)),
        None if !question.question_type.uses_options() && !existing.is_empty() => Some(Vec::new()),
        None => None,
    };
    let drafts: Vec<OptionDraft<'_>> = match &replacement {
        Some(options) => options
            .iter()
            .map(|option| OptionDraft { text: &option.text, is_correct: option.is_correct })
            .collect(),
        None => existing
            .iter()
            .map(|option| OptionDraft { text: &option.text, is_correct: option.is_correct })
            .collect(),
    };
    validate_question(
        question.question_type,
        question.points,
        &drafts,
        question.acceptable_answers.as_deref(),
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    question.updated_at = primitive_now_utc();
    let question = repositories::questions::update(&mut *tx, &question)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    let options = match replacement {
        Some(options) => {
            repositories::questions::delete_options(&mut *tx, &question.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to replace answer options"))?;
            repositories::questions::insert_options(&mut *tx, &question.id, &options)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to replace answer options"))?
        }
        None => existing,
    };

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(test_id = %test.id, question_id = %question.id, "Question updated");
    Ok(Json(helpers::question_response(question, &options)))
}

pub(in crate::api::authoring) async fn delete_question(
    Path((test_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test = helpers::lock_test(&mut tx, &test_id).await?;
    require_test_owner(&test, &user)?;
    helpers::ensure_draft(&test)?;

    let removed =
        repositories::questions::deactivate(&mut *tx, &test.id, &question_id, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;
    if !removed {
        return Err(ApiError::NotFound("Question not found".to_string()));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(test_id = %test.id, question_id = %question_id, "Question deleted");
    Ok(StatusCode::NO_CONTENT)
}
