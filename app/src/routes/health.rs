//! Liveness/readiness endpoints. Trimmed from the teacher's richer
//! process/database health surface (spec scopes storage out) but keeps the
//! same status/uptime/version shape.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
        .route("/ready", get(ready))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
    version: &'static str,
}

async fn root(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            uptime_seconds: state.uptime_seconds(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
        .into_response()
}

async fn live() -> impl IntoResponse {
    StatusCode::OK
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let _ = state;
    StatusCode::OK
}
