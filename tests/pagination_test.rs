//! Integration tests for feed pagination against both store backends.

use std::sync::Arc;

use community_feed::db::Database;
use community_feed::error::FeedError;
use community_feed::feed::FeedService;
use community_feed::model::{Post, PostType};
use community_feed::store::{FeedStore, MemoryStore};
use tempfile::TempDir;

fn post(id: &str, created_at: i64) -> Post {
    Post {
        id: id.to_string(),
        title: id.to_string(),
        title_translated: None,
        body: String::new(),
        body_translated: None,
        post_type: PostType::SelfText,
        author: "exile".to_string(),
        created_at,
        score: 0,
        num_comments: 0,
        upvote_ratio: None,
        url: String::new(),
        comments: Vec::new(),
    }
}

/// Posts `p1..=p<n>`, with `p1` the newest.
async fn seed(store: &dyn FeedStore, n: i64) {
    for i in 1..=n {
        store
            .upsert_post(&post(&format!("p{i}"), 10_000 - i))
            .await
            .unwrap();
    }
}

async fn sqlite_service() -> (FeedService, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("test.sqlite"))
        .await
        .expect("Failed to create database");
    (FeedService::new(Arc::new(db)), temp_dir)
}

fn ids(posts: &[Post]) -> Vec<String> {
    posts.iter().map(|p| p.id.clone()).collect()
}

fn expected(range: std::ops::RangeInclusive<i64>) -> Vec<String> {
    range.map(|i| format!("p{i}")).collect()
}

async fn assert_twenty_five_post_scenario(service: &FeedService) {
    let first = service.get_page(1, 10).await.unwrap();
    assert_eq!(ids(&first.posts), expected(1..=10));
    assert!(first.has_more);

    let second = service.get_page(2, 10).await.unwrap();
    assert_eq!(ids(&second.posts), expected(11..=20));
    assert!(second.has_more);

    let third = service.get_page(3, 10).await.unwrap();
    assert_eq!(ids(&third.posts), expected(21..=25));
    assert!(!third.has_more);

    let fourth = service.get_page(4, 10).await.unwrap();
    assert!(fourth.posts.is_empty());
    assert!(!fourth.has_more);
}

#[tokio::test]
async fn test_twenty_five_posts_sqlite() {
    let (service, _temp_dir) = sqlite_service().await;
    seed(service.store().as_ref(), 25).await;
    assert_twenty_five_post_scenario(&service).await;
}

#[tokio::test]
async fn test_twenty_five_posts_memory() {
    let service = FeedService::new(Arc::new(MemoryStore::new()));
    seed(service.store().as_ref(), 25).await;
    assert_twenty_five_post_scenario(&service).await;
}

#[tokio::test]
async fn test_same_page_twice_is_identical() {
    let (service, _temp_dir) = sqlite_service().await;
    seed(service.store().as_ref(), 13).await;

    let a = service.get_page(2, 5).await.unwrap();
    let b = service.get_page(2, 5).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_walking_pages_covers_every_post_once() {
    let (service, _temp_dir) = sqlite_service().await;
    seed(service.store().as_ref(), 23).await;

    for size in [1, 4, 7, 23, 50] {
        let mut seen = Vec::new();
        let mut page = 1;
        loop {
            let result = service.get_page(page, size).await.unwrap();
            seen.extend(ids(&result.posts));
            if !result.has_more {
                break;
            }
            page += 1;
        }
        assert_eq!(seen, expected(1..=23), "page size {size}");
    }
}

#[tokio::test]
async fn test_exact_multiple_has_no_trailing_more() {
    let service = FeedService::new(Arc::new(MemoryStore::new()));
    seed(service.store().as_ref(), 20).await;

    let second = service.get_page(2, 10).await.unwrap();
    assert_eq!(second.posts.len(), 10);
    assert!(!second.has_more);
}

#[tokio::test]
async fn test_has_more_is_recomputed_after_ingestion() {
    let service = FeedService::new(Arc::new(MemoryStore::new()));
    seed(service.store().as_ref(), 10).await;
    assert!(!service.get_page(1, 10).await.unwrap().has_more);

    service
        .store()
        .upsert_post(&post("older", 1))
        .await
        .unwrap();
    assert!(service.get_page(1, 10).await.unwrap().has_more);
}

#[tokio::test]
async fn test_invalid_arguments() {
    let service = FeedService::new(Arc::new(MemoryStore::new()));
    assert!(matches!(
        service.get_page(0, 10).await,
        Err(FeedError::InvalidArgument(_))
    ));
    assert!(matches!(
        service.get_page(1, 0).await,
        Err(FeedError::InvalidArgument(_))
    ));
}
