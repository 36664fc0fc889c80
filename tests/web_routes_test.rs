//! Integration tests for web routes.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use community_feed::config::Config;
use community_feed::db::Database;
use community_feed::feed::FeedService;
use community_feed::model::{FeedPage, Post, PostType};
use community_feed::store::{FeedStore, MemoryStore, PostWindow, UpsertOutcome};
use community_feed::web::{create_app, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

/// A store whose every call fails.
struct BrokenStore;

#[async_trait]
impl FeedStore for BrokenStore {
    async fn upsert_post(&self, _post: &Post) -> anyhow::Result<UpsertOutcome> {
        Err(anyhow!("database is locked"))
    }

    async fn fetch_window(&self, _offset: u64, _limit: u32) -> anyhow::Result<PostWindow> {
        Err(anyhow!("database is locked"))
    }

    async fn get_post(&self, _id: &str) -> anyhow::Result<Option<Post>> {
        Err(anyhow!("database is locked"))
    }
}

fn post(id: &str, created_at: i64) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Title {id}"),
        title_translated: None,
        body: "body".to_string(),
        body_translated: None,
        post_type: PostType::SelfText,
        author: "exile".to_string(),
        created_at,
        score: 1,
        num_comments: 0,
        upvote_ratio: None,
        url: String::new(),
        comments: Vec::new(),
    }
}

fn create_test_app(store: Arc<dyn FeedStore>) -> Router {
    create_app(AppState {
        feed: FeedService::new(store),
        ingestor: None,
        config: Arc::new(Config::for_testing()),
    })
}

async fn seeded_app(n: i64) -> Router {
    let store = Arc::new(MemoryStore::new());
    for i in 1..=n {
        store
            .upsert_post(&post(&format!("p{i}"), 1_000 - i))
            .await
            .unwrap();
    }
    create_test_app(store)
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn json_page(response: axum::response::Response) -> FeedPage {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = get(seeded_app(0).await, "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn test_api_post_pages() {
    let app = seeded_app(15).await;

    let response = get(app.clone(), "/api/post?page=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_page(response).await;
    assert_eq!(page.posts.len(), 10);
    assert_eq!(page.posts[0].id, "p1");
    assert!(page.has_more);

    let page = json_page(get(app, "/api/post?page=2").await).await;
    assert_eq!(page.posts.len(), 5);
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_api_post_wire_format() {
    let response = get(seeded_app(1).await, "/api/post").await;
    let value: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();

    assert_eq!(value["hasMore"], false);
    let first = &value["posts"][0];
    assert_eq!(first["id"], "p1");
    assert_eq!(first["postType"], "self");
    assert!(first.get("titleTranslated").is_some());
    assert!(first.get("numComments").is_some());
}

#[tokio::test]
async fn test_api_post_page_defaults_to_one() {
    let app = seeded_app(12).await;

    for uri in ["/api/post", "/api/post?page=", "/api/post?page=abc"] {
        let response = get(app.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let page = json_page(response).await;
        assert_eq!(page.posts[0].id, "p1", "{uri}");
    }
}

#[tokio::test]
async fn test_api_post_rejects_non_positive_page() {
    let app = seeded_app(3).await;
    for uri in ["/api/post?page=0", "/api/post?page=-2"] {
        let response = get(app.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_api_post_store_failure_is_500() {
    let response = get(create_test_app(Arc::new(BrokenStore)), "/api/post?page=1").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let value: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(value["error"], "Failed to fetch posts");
}

#[tokio::test]
async fn test_api_post_with_sqlite_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("test.sqlite"))
        .await
        .expect("Failed to create database");
    db.upsert_post(&post("only", 5)).await.unwrap();

    let page = json_page(get(create_test_app(Arc::new(db)), "/api/post").await).await;
    assert_eq!(page.posts.len(), 1);
    assert_eq!(page.posts[0].id, "only");
}

#[tokio::test]
async fn test_ingest_without_credentials_is_503() {
    let app = seeded_app(0).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ingest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_root_redirects_to_default_locale() {
    let response = get(seeded_app(0).await, "/").await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/zh-CN");
}

#[tokio::test]
async fn test_unknown_locale_falls_back_to_default() {
    let response = get(seeded_app(0).await, "/fr").await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/zh-CN");
}

#[tokio::test]
async fn test_locale_page_renders_feed() {
    let app = seeded_app(11).await;

    let response = get(app.clone(), "/en").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains(r#"<html lang="en">"#));
    assert!(html.contains("Title p1"));
    assert!(html.contains("/en?page=2"));

    let response = get(app, "/zh-CN?page=2").await;
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("Title p11"));
    assert!(!html.contains("?page=3"));
}
