mod helpers;
mod student;
mod teacher;

use axum::{routing::get, routing::post, routing::put, Router};

use crate::core::state::AppState;

pub(crate) use student::start_attempt;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        // Student endpoints
        .route("/:attempt_id/answers", put(student::save_answer))
        .route("/:attempt_id/submit", post(student::submit_attempt))
        // Shared and teacher endpoints
        .route("/:attempt_id", get(teacher::get_result))
        .route("/:attempt_id/grade", post(teacher::grade_attempt))
}
