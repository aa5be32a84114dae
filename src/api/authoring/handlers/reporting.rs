use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::{require_test_owner, CurrentUser};
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::core::time::{format_optional, format_primitive};
use crate::repositories;
use crate::schemas::attempt::{AttemptListItem, AttemptListQuery};
use crate::schemas::test::TestSummaryResponse;
use crate::services::summary::summarize;

use super::super::helpers;

pub(in crate::api::authoring) async fn list_attempts(
    Path(test_id): Path<String>,
    Query(params): Query<AttemptListQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AttemptListItem>>, ApiError> {
    let test = helpers::fetch_test(state.db(), &test_id).await?;
    require_test_owner(&test, &user)?;

    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);

    let rows =
        repositories::attempts::list_by_test(state.db(), &test.id, params.status, skip, limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;
    let total_count = repositories::attempts::count_by_test(state.db(), &test.id, params.status)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    let items = rows
        .into_iter()
        .map(|row| {
            let attempt = row.attempt;
            AttemptListItem {
                id: attempt.id,
                student_id: attempt.student_id,
                student_name: row.student_name,
                attempt_number: attempt.attempt_number,
                status: attempt.status,
                started_at: format_primitive(attempt.started_at),
                submitted_at: format_optional(attempt.submitted_at),
                graded_at: format_optional(attempt.graded_at),
                score: attempt.score,
                max_score: attempt.max_score,
                percentage: attempt.percentage,
                passed: attempt.passed,
            }
        })
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

pub(in crate::api::authoring) async fn get_summary(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TestSummaryResponse>, ApiError> {
    let test = helpers::fetch_test(state.db(), &test_id).await?;
    require_test_owner(&test, &user)?;

    let attempts = repositories::attempts::list_completed(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempts"))?;

    Ok(Json(summarize(&test.id, &attempts)))
}
