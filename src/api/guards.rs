use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::{Test, User};
use crate::db::types::CourseRole;
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

/// Approved membership in the course with `role`.
pub(crate) async fn require_course_role(
    state: &AppState,
    user: &User,
    course_id: &str,
    role: CourseRole,
) -> Result<(), ApiError> {
    let allowed =
        repositories::course_memberships::has_approved_role(state.db(), &user.id, course_id, role)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch course membership"))?;

    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not enough permissions for this course".to_string()))
    }
}

pub(crate) fn require_test_owner(test: &Test, user: &User) -> Result<(), ApiError> {
    if test.created_by == user.id {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only the test owner can do this".to_string()))
    }
}
