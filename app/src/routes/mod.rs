mod drill;
mod health;
mod lesson;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .route("/drill/next", post(drill::next_drill))
        .route("/drill/stats", get(drill::drill_stats))
        .route("/lesson/start", post(lesson::start_lesson))
        .route("/lesson/first/:session_id", get(lesson::first_drill))
        .route("/lesson/next", post(lesson::submit_answer))
        .route("/lesson/themes", get(lesson::themes))
        .with_state(state)
}
