mod handlers;
mod helpers;

use axum::{routing::get, routing::patch, routing::post, Router};

use crate::api::attempts;
use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_test))
        .route("/:test_id", get(handlers::get_test).patch(handlers::update_test))
        .route("/:test_id/questions", post(handlers::add_question))
        .route(
            "/:test_id/questions/:question_id",
            patch(handlers::update_question).delete(handlers::delete_question),
        )
        .route("/:test_id/publish", post(handlers::publish_test))
        .route("/:test_id/close", post(handlers::close_test))
        .route(
            "/:test_id/attempts",
            get(handlers::list_attempts).post(attempts::start_attempt),
        )
        .route("/:test_id/summary", get(handlers::get_summary))
}

#[cfg(test)]
mod tests;
