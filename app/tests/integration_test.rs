use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

fn create_test_app() -> axum::Router {
    drill_engine_service::create_app()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_root_is_ok() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn next_drill_returns_a_problem_with_correct_in_alternatives() {
    let app = create_test_app();
    let body = json!({
        "user_id": "integration-test-user",
        "problem_type_id": "tone_1",
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/drill/next")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let correct = json["drill"]["correct_sequence"].clone();
    let alternatives = json["drill"]["alternatives"].as_array().unwrap();
    assert!(alternatives.iter().any(|a| *a == correct));
}

#[tokio::test]
async fn unknown_problem_type_is_not_found() {
    let app = create_test_app();
    let body = json!({
        "user_id": "integration-test-user",
        "problem_type_id": "not-a-real-id",
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/drill/next")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lesson_lifecycle_starts_and_serves_first_drill() {
    let app = create_test_app();
    let start_body = json!({ "user_id": "lesson-test-user", "theme_id": 0 });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/lesson/start")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&start_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let started = body_json(response).await;
    let session_id = started["session_id"].as_str().unwrap().to_string();
    assert_eq!(started["total_drills"], 10);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/lesson/first/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["is_complete"], false);
    assert!(first["drill"].is_object());
}

#[tokio::test]
async fn lesson_themes_lists_eight_fixed_themes() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/lesson/themes").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["themes"].as_array().unwrap().len(), 8);
}
