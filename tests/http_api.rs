use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use colab_session::{build_router, config::Config, AppState};
use colab_session::ws::{ConnectionHandle, Outbound};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

async fn call(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

fn connect(state: &AppState, doc: &str, user: &str) -> mpsc::Receiver<Outbound> {
    let (tx, rx) = mpsc::channel(16);
    state.registry.join(doc, user, ConnectionHandle::new(tx), |_, _| ());
    rx
}

#[tokio::test]
async fn health_and_ready() {
    let state = Arc::new(AppState::new(Config::default()));
    let (status, body) = call(&state, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = call(&state, get("/api/ready")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn info_for_unknown_document_is_empty() {
    let state = Arc::new(AppState::new(Config::default()));
    let (status, body) = call(&state, get("/api/collaboration/nothing/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"active_users": [], "locked_by": null, "locked_at": null, "recent_changes": []}));
}

#[tokio::test]
async fn rest_lock_follows_session_rules() {
    let state = Arc::new(AppState::new(Config::default()));
    let mut alice = connect(&state, "doc1", "alice");
    let _bob = connect(&state, "doc1", "bob");

    let (status, body) = call(&state, post("/api/collaboration/doc1/lock?user_id=alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    assert_eq!(
        alice.try_recv().unwrap(),
        Outbound::Text(r#"{"type":"lock","user_id":"alice","locked":true}"#.to_string())
    );

    let (_, body) = call(&state, post("/api/collaboration/doc1/lock?user_id=bob")).await;
    assert_eq!(body, json!({"success": false}));
    let (_, body) = call(&state, post("/api/collaboration/doc1/unlock?user_id=bob")).await;
    assert_eq!(body, json!({"success": false}));

    let (_, body) = call(&state, get("/api/collaboration/doc1/info")).await;
    assert_eq!(body["locked_by"], "alice");
    assert!(body["locked_at"].is_string());
    assert_eq!(body["active_users"], json!(["alice", "bob"]));

    let (_, body) = call(&state, post("/api/collaboration/doc1/unlock?user_id=alice")).await;
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn rest_lock_requires_connected_participant() {
    let state = Arc::new(AppState::new(Config::default()));
    let (status, body) = call(&state, post("/api/collaboration/doc1/lock?user_id=alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let _alice = connect(&state, "doc1", "alice");
    let (status, _) = call(&state, post("/api/collaboration/doc1/lock?user_id=mallory")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn secured_routes_check_identity() {
    let secret = "s3cret";
    let state = Arc::new(AppState::new(Config {
        cloud_auth_jwt_secret: Some(secret.to_string()),
        ..Config::default()
    }));
    let _alice = connect(&state, "doc1", "alice");

    let (status, _) = call(&state, post("/api/collaboration/doc1/lock?user_id=alice")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let exp = chrono::Utc::now().timestamp() + 60;
    let token = encode(
        &Header::default(),
        &json!({"sub": "bob", "exp": exp}),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/collaboration/doc1/lock?user_id=alice")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&state, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Health stays open
    let (status, _) = call(&state, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
}
