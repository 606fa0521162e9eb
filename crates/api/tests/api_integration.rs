//! API integration tests.
//!
//! These tests drive the router end to end over an in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    middleware::from_fn_with_state,
};
use chrono::{Duration, Utc};
use fun_api::{AppState, SessionVerifier, auth_middleware, router as api_router};
use fun_common::{IdGenerator, LocalStorage};
use fun_core::{DataGateway, LocalChangeFeed};
use fun_db::entities::feed_post::{self, ModerationStatus, PostType};
use fun_db::test_utils::InMemoryGateway;
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    memory: Arc<InMemoryGateway>,
    verifier: SessionVerifier,
}

impl TestApp {
    fn new() -> Self {
        let memory = Arc::new(InMemoryGateway::new());
        let dir = std::env::temp_dir().join(format!("fun-api-{}", IdGenerator::new().generate()));
        let storage = Arc::new(LocalStorage::new(dir, "https://media.fun.test/files".to_string()));
        let changes = Arc::new(LocalChangeFeed::new());

        let gateway = DataGateway::new(
            memory.clone(),
            memory.clone(),
            memory.clone(),
            memory.clone(),
            storage,
        )
        .with_publisher(changes.clone());
        let verifier = SessionVerifier::new(SECRET);
        let state = AppState::new(gateway, changes, verifier.clone());

        let router = api_router()
            .layer(from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state);

        Self {
            router,
            memory,
            verifier,
        }
    }

    fn token(&self, user_id: &str) -> String {
        self.verifier.issue(user_id, Duration::hours(1)).unwrap()
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn post(id: &str, status: ModerationStatus, minutes_ago: i64) -> feed_post::Model {
    let at = (Utc::now() - Duration::minutes(minutes_ago)).into();
    feed_post::Model {
        id: id.to_string(),
        user_id: "author1".to_string(),
        post_type: PostType::Need,
        title: Some(format!("Cần hỗ trợ {id}")),
        content: Some("Gạo và nước sạch".to_string()),
        media_urls: json!(["https://cdn.example/a.jpg"]),
        category: Some("food".to_string()),
        location: Some("Quảng Nam".to_string()),
        region_code: None,
        latitude: None,
        longitude: None,
        campaign_id: None,
        target_amount: Some(5_000_000),
        fulfilled_amount: 1_000_000,
        beneficiaries_count: Some(12),
        urgency: None,
        is_matched: false,
        matched_post_id: None,
        moderation_status: status,
        is_active: true,
        expires_at: None,
        created_at: at,
        updated_at: at,
    }
}

#[tokio::test]
async fn test_feed_lists_only_visible_posts() {
    let app = TestApp::new();
    app.memory.seed_post(post("visible", ModerationStatus::Approved, 1)).await;
    app.memory.seed_post(post("pending", ModerationStatus::Pending, 2)).await;
    let mut hidden = post("hidden", ModerationStatus::Approved, 3);
    hidden.is_active = false;
    app.memory.seed_post(hidden).await;

    let (status, body) = app.call("GET", "/feed", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let posts = body["data"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], "visible");
    assert_eq!(posts[0]["media"][0]["type"], "image");
}

#[tokio::test]
async fn test_feed_page_reports_next_page() {
    let app = TestApp::new();
    for i in 0..12 {
        app.memory
            .seed_post(post(&format!("p{i:02}"), ModerationStatus::Approved, i))
            .await;
    }

    let (_, first) = app.call("GET", "/feed/page?page=0", None, None).await;
    assert_eq!(first["data"]["posts"].as_array().unwrap().len(), 10);
    assert_eq!(first["data"]["has_next_page"], true);

    let (_, second) = app.call("GET", "/feed/page?page=1", None, None).await;
    assert_eq!(second["data"]["posts"].as_array().unwrap().len(), 2);
    assert_eq!(second["data"]["has_next_page"], false);
}

#[tokio::test]
async fn test_feed_page_beyond_sql_offset_is_bad_request() {
    let app = TestApp::new();
    let page = i64::MAX as u64 / 10 + 1;

    let (status, body) = app
        .call("GET", &format!("/feed/page?page={page}"), None, None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_feed_filter_by_type() {
    let app = TestApp::new();
    app.memory.seed_post(post("need", ModerationStatus::Approved, 1)).await;
    let mut story = post("story", ModerationStatus::Approved, 2);
    story.post_type = PostType::Story;
    app.memory.seed_post(story).await;

    let (_, body) = app.call("GET", "/feed?post_type=story", None, None).await;

    let posts = body["data"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], "story");
    assert_eq!(posts[0]["target_amount"], Value::Null);
    assert_eq!(posts[0]["fulfilled_amount"], 0);
}

#[tokio::test]
async fn test_create_post_requires_login() {
    let app = TestApp::new();

    let (status, body) = app
        .call("POST", "/posts", None, Some(json!({"post_type": "need", "content": "Cần gạo"})))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["message"], "Vui lòng đăng nhập để tiếp tục");
}

#[tokio::test]
async fn test_create_post_starts_pending() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/posts",
            Some("user1"),
            Some(json!({"post_type": "need", "content": "Cần gạo cho 10 hộ"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["moderation_status"], "pending");
    assert_eq!(body["data"]["user_id"], "user1");

    let (_, feed) = app.call("GET", "/feed", None, None).await;
    assert!(feed["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_empty_post_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .call("POST", "/posts", Some("user1"), Some(json!({"post_type": "story"})))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_invalid_token_is_anonymous() {
    let app = TestApp::new();
    app.memory.seed_post(post("p1", ModerationStatus::Approved, 1)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/posts/p1/reactions")
        .header(header::AUTHORIZATION, "Bearer forged")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"reaction_type":"love"}"#))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = app.call("GET", "/posts/p1", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reaction_flow() {
    let app = TestApp::new();
    app.memory.seed_post(post("p1", ModerationStatus::Approved, 1)).await;

    let (status, _) = app
        .call("POST", "/posts/p1/reactions", Some("user1"), Some(json!({"reaction_type": "love"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call("POST", "/posts/p1/reactions", Some("user1"), Some(json!({"reaction_type": "like"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.call("GET", "/posts/p1", Some("user1"), None).await;
    assert_eq!(body["data"]["reaction_count"], 1);
    assert_eq!(body["data"]["viewer_reaction"], "like");

    let (first, _) = app.call("DELETE", "/posts/p1/reactions", Some("user1"), None).await;
    let (second, _) = app.call("DELETE", "/posts/p1/reactions", Some("user1"), None).await;
    assert_eq!(first, StatusCode::NO_CONTENT);
    assert_eq!(second, StatusCode::NO_CONTENT);
    assert!(app.memory.reactions().await.is_empty());
}

#[tokio::test]
async fn test_comment_flow() {
    let app = TestApp::new();
    app.memory.seed_post(post("p1", ModerationStatus::Approved, 1)).await;

    let (status, created) = app
        .call("POST", "/posts/p1/comments", Some("user1"), Some(json!({"content": "Mình góp 2 bao gạo"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(
            "POST",
            "/posts/p1/comments",
            Some("user2"),
            Some(json!({"content": "Cảm ơn bạn", "parent_comment_id": comment_id})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, threads) = app.call("GET", "/posts/p1/comments", None, None).await;
    let threads = threads["data"].as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["replies"].as_array().unwrap().len(), 1);

    let uri = format!("/comments/{comment_id}");
    let (status, body) = app.call("DELETE", &uri, Some("user2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = app.call("DELETE", &uri, Some("user1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_comment_on_pending_post_is_not_found() {
    let app = TestApp::new();
    app.memory.seed_post(post("pending", ModerationStatus::Pending, 1)).await;

    let (status, body) = app
        .call("POST", "/posts/pending/comments", Some("user1"), Some(json!({"content": "Xin chào"})))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "POST_NOT_FOUND");
    assert!(app.memory.comments().await.is_empty());
}

#[tokio::test]
async fn test_missing_post_returns_localized_404() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/posts/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "POST_NOT_FOUND");
    assert_eq!(body["error"]["message"], "Bài viết không tồn tại hoặc đã bị xóa");
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = TestApp::new();

    let (status, _) = app.call("GET", "/nonexistent", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
