//! Integration tests for the chat history endpoints.
//!
//! Runs the router against an in-memory SQLite pool with the embedded
//! migrations applied.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use chatrelay::api::{create_router, AppState};
use chatrelay::config::UpstreamConfig;
use chatrelay::relay::UpstreamClient;
use chatrelay::storage::MessageStore;

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    pool
}

fn setup_app(pool: SqlitePool) -> axum::Router {
    let upstream = UpstreamConfig {
        base_url: "https://fake.test/v1".to_string(),
        api_key: "sk-test".into(),
        model: "moonshot-v1-8k".to_string(),
        temperature: 0.7,
        idle_timeout_secs: 30,
        connect_timeout_secs: 2,
    };

    let state = AppState {
        store: MessageStore::new(pool),
        upstream: Arc::new(UpstreamClient::new(reqwest::Client::new(), upstream)),
        idle_timeout: Duration::from_secs(30),
    };

    create_router(state)
}

fn post_message(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn parse_body(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
    (status, json)
}

#[tokio::test]
async fn save_then_list_round_trip() {
    let app = setup_app(setup_pool().await);

    let (status, json) = parse_body(
        app.clone()
            .oneshot(post_message(serde_json::json!({
                "id": "msg-1",
                "content": "hello there",
                "type": "user"
            })))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, json) = parse_body(
        app.oneshot(
            Request::builder()
                .uri("/api/messages")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!([
            { "id": "msg-1", "content": "hello there", "type": "user" }
        ])
    );
}

#[tokio::test]
async fn listing_orders_by_creation_time_then_insertion() {
    let pool = setup_pool().await;

    // Seed rows directly so creation times are controlled. The first two
    // share a timestamp; the rowid must break the tie in insertion order.
    for (message_id, content, kind, created_at) in [
        ("b", "second inserted", "assistant", "2026-08-30T10:00:00+00:00"),
        ("a", "third inserted", "user", "2026-08-30T10:00:00+00:00"),
        ("c", "earliest", "user", "2026-08-30T09:00:00+00:00"),
    ] {
        sqlx::query(
            "INSERT INTO messages (message_id, content, kind, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(message_id)
        .bind(content)
        .bind(kind)
        .bind(created_at)
        .execute(&pool)
        .await
        .expect("seed row");
    }

    let app = setup_app(pool);
    let (status, json) = parse_body(
        app.oneshot(
            Request::builder()
                .uri("/api/messages")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .map(|m| m["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn missing_fields_rejected_with_400() {
    let app = setup_app(setup_pool().await);

    for body in [
        serde_json::json!({ "content": "x", "type": "user" }),
        serde_json::json!({ "id": "m1", "type": "user" }),
        serde_json::json!({ "id": "m1", "content": "x" }),
        serde_json::json!({ "id": "", "content": "x", "type": "user" }),
        serde_json::json!({}),
    ] {
        let (status, json) = parse_body(
            app.clone()
                .oneshot(post_message(body.clone()))
                .await
                .expect("response"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(json.get("error").is_some(), "body: {}", body);
    }
}

#[tokio::test]
async fn unknown_message_type_rejected() {
    let app = setup_app(setup_pool().await);

    let (status, json) = parse_body(
        app.oneshot(post_message(serde_json::json!({
            "id": "m1",
            "content": "x",
            "type": "system"
        })))
        .await
        .expect("response"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().expect("error").contains("system"));
}

#[tokio::test]
async fn duplicate_id_is_store_failure() {
    let app = setup_app(setup_pool().await);
    let message = serde_json::json!({
        "id": "dup",
        "content": "x",
        "type": "user"
    });

    let (status, _) = parse_body(
        app.clone()
            .oneshot(post_message(message.clone()))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = parse_body(
        app.oneshot(post_message(message))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn health_reports_ok() {
    let app = setup_app(setup_pool().await);

    let (status, json) = parse_body(
        app.oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}
