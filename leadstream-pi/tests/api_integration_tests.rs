//! Integration tests for the leadstream-pi API
//!
//! Exercises the HTTP surface end-to-end: request validation rejects
//! before streaming, and accepted requests stream events that the
//! consumer-side state machine reassembles into the full record set.

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt;

use helpers::{page, ScriptedSource};
use leadstream_pi::client::ImportStreamState;
use leadstream_pi::config::ImportSettings;
use leadstream_pi::models::SessionStatus;
use leadstream_pi::services::{SourceError, SourcePage};
use leadstream_pi::AppState;

/// Test helper: build the app against a scripted directory
fn create_test_app(pages: Vec<Result<SourcePage, SourceError>>) -> axum::Router {
    let source = Arc::new(ScriptedSource::new(pages));
    let import = ImportSettings {
        page_delay_ms: 0,
        ..ImportSettings::default()
    };
    let state = AppState::new(source, import);
    leadstream_pi::build_router(state)
}

fn start_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/import/stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn error_code(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["error"]["code"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(vec![]);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "leadstream-pi");
}

#[tokio::test]
async fn test_empty_query_is_rejected_before_streaming() {
    let app = create_test_app(vec![]);

    let response = app
        .oneshot(start_request(json!({
            "source_query": "   ",
            "requester_id": "user-1",
            "workspace_id": "ws-1"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "BAD_REQUEST");
}

#[tokio::test]
async fn test_non_positive_target_is_rejected() {
    for target in [0, -5] {
        let app = create_test_app(vec![]);
        let response = app
            .oneshot(start_request(json!({
                "source_query": "https://directory.example.com/search?savedSearchId=42",
                "target_count": target,
                "requester_id": "user-1",
                "workspace_id": "ws-1"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = create_test_app(vec![]);

    let response = app
        .oneshot(start_request(json!({
            "source_query": "https://directory.example.com/search?savedSearchId=42",
            "requester_id": "",
            "workspace_id": ""
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_full_stream_reassembles_every_record() {
    let app = create_test_app(vec![
        page("a", 40, Some("c1")),
        page("b", 35, Some("c2")),
        page("c", 25, Some("c3")),
    ]);

    let response = app
        .oneshot(start_request(json!({
            "source_query": "https://directory.example.com/search?savedSearchId=42",
            "target_count": 100,
            "requester_id": "user-1",
            "workspace_id": "ws-1"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();

    let mut state = ImportStreamState::new(100);
    state.feed(&body);
    let outcome = state.finish();

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert!(outcome.session_id.is_some());
    assert_eq!(outcome.prospects.len(), 100);
    assert_eq!(outcome.progress.current, 100);
    assert_eq!(outcome.progress.target, 100);
    assert_eq!(outcome.progress.batches_seen, 3);
    assert_eq!(outcome.progress.percentage, 100);
    assert!(outcome.batch_failures.is_empty());
}

#[tokio::test]
async fn test_requested_target_is_clamped_and_announced() {
    // 10 requested, below the feasible minimum of 25.
    let app = create_test_app(vec![page("a", 25, Some("c1"))]);

    let response = app
        .oneshot(start_request(json!({
            "source_query": "https://directory.example.com/search?savedSearchId=42",
            "target_count": 10,
            "requester_id": "user-1",
            "workspace_id": "ws-1"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();

    let mut state = ImportStreamState::new(10);
    state.feed(&body);
    let outcome = state.finish();

    // The start event corrected the target to the clamped minimum.
    assert_eq!(outcome.progress.target, 25);
    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(outcome.prospects.len(), 25);
}

#[tokio::test]
async fn test_one_bad_page_still_streams_to_completion() {
    let app = create_test_app(vec![
        page("a", 30, Some("c1")),
        Err(SourceError::Recoverable("directory timeout".to_string())),
        page("", 0, None),
    ]);

    let response = app
        .oneshot(start_request(json!({
            "source_query": "https://directory.example.com/search?savedSearchId=42",
            "target_count": 50,
            "requester_id": "user-1",
            "workspace_id": "ws-1"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();

    let mut state = ImportStreamState::new(50);
    state.feed(&body);
    let outcome = state.finish();

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(outcome.prospects.len(), 30);
    assert_eq!(outcome.progress.current, 30);
    assert_eq!(outcome.batch_failures.len(), 1);
    assert_eq!(outcome.batch_failures[0].0, 2);
}

#[tokio::test]
async fn test_first_page_failure_streams_a_terminal_error() {
    let app = create_test_app(vec![Err(SourceError::Recoverable(
        "directory timeout".to_string(),
    ))]);

    let response = app
        .oneshot(start_request(json!({
            "source_query": "https://directory.example.com/search?savedSearchId=42",
            "target_count": 100,
            "requester_id": "user-1",
            "workspace_id": "ws-1"
        })))
        .await
        .unwrap();

    // Streaming had already begun; the failure arrives in-band.
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();

    let mut state = ImportStreamState::new(100);
    state.feed(&body);
    let outcome = state.finish();

    assert_eq!(outcome.status, SessionStatus::Error);
    assert!(outcome.error.is_some());
    assert!(outcome.prospects.is_empty());
    assert_eq!(outcome.batch_failures.len(), 1);
}
