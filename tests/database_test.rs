//! Integration tests for the SQLite feed store.

use community_feed::db::{fetch_window, get_post, upsert_post, Database};
use community_feed::model::{Comment, Post, PostType};
use community_feed::store::UpsertOutcome;
use tempfile::TempDir;

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn count_posts(db: &Database) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(db.pool())
        .await
        .expect("Failed to count posts")
}

fn comment(id: &str, body: &str) -> Comment {
    Comment {
        id: id.to_string(),
        author: "commenter".to_string(),
        created_at: 1_700_000_100,
        score: 1,
        body: body.to_string(),
        body_translated: None,
    }
}

fn post(id: &str, created_at: i64, comments: Vec<Comment>) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Title {id}"),
        title_translated: None,
        body: "body".to_string(),
        body_translated: None,
        post_type: PostType::SelfText,
        author: "exile".to_string(),
        created_at,
        score: 10,
        num_comments: i64::try_from(comments.len()).unwrap(),
        upvote_ratio: Some(0.9),
        url: String::new(),
        comments,
    }
}

#[tokio::test]
async fn test_upsert_and_get_post_round_trip() {
    let (db, _temp_dir) = setup_db().await;

    let mut original = post("abc", 1_700_000_000, vec![comment("c1", "first")]);
    original.title_translated = Some("标题".to_string());
    original.upvote_ratio = None;

    let outcome = upsert_post(db.pool(), &original).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);

    let stored = get_post(db.pool(), "abc")
        .await
        .expect("Failed to get post")
        .expect("Post not found");
    assert_eq!(stored, original);

    assert!(get_post(db.pool(), "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let (db, _temp_dir) = setup_db().await;
    let p = post("abc", 1_700_000_000, vec![comment("c1", "first")]);

    assert_eq!(upsert_post(db.pool(), &p).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(upsert_post(db.pool(), &p).await.unwrap(), UpsertOutcome::Unchanged);
    assert_eq!(count_posts(&db).await, 1);
}

#[tokio::test]
async fn test_changed_post_is_updated_in_place() {
    let (db, _temp_dir) = setup_db().await;
    upsert_post(
        db.pool(),
        &post("abc", 1_700_000_000, vec![comment("c1", "first"), comment("c2", "second")]),
    )
    .await
    .unwrap();

    let mut edited = post(
        "abc",
        1_700_000_000,
        vec![comment("c3", "third"), comment("c1", "first, edited")],
    );
    edited.title = "Edited title".to_string();
    edited.score = 42;

    assert_eq!(
        upsert_post(db.pool(), &edited).await.unwrap(),
        UpsertOutcome::Updated
    );
    assert_eq!(count_posts(&db).await, 1);

    let stored = get_post(db.pool(), "abc").await.unwrap().unwrap();
    assert_eq!(stored.title, "Edited title");
    assert_eq!(stored.score, 42);

    // c1 keeps its slot, c2 is never removed, c3 is appended
    let bodies: Vec<_> = stored.comments.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, ["first, edited", "second", "third"]);
}

#[tokio::test]
async fn test_window_orders_newest_first_with_id_tiebreak() {
    let (db, _temp_dir) = setup_db().await;
    for (id, created) in [("b", 100), ("a", 100), ("c", 300), ("d", 200)] {
        upsert_post(db.pool(), &post(id, created, Vec::new()))
            .await
            .unwrap();
    }

    let window = fetch_window(db.pool(), 0, 10).await.unwrap();
    let ids: Vec<_> = window.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["c", "d", "a", "b"]);
    assert_eq!(window.total, 4);

    let tail = fetch_window(db.pool(), 3, 10).await.unwrap();
    assert_eq!(tail.posts.len(), 1);
    assert_eq!(tail.posts[0].id, "b");
    assert_eq!(tail.total, 4);
}

#[tokio::test]
async fn test_window_attaches_comments_to_their_posts() {
    let (db, _temp_dir) = setup_db().await;
    upsert_post(
        db.pool(),
        &post("one", 200, vec![comment("x", "on one"), comment("y", "also on one")]),
    )
    .await
    .unwrap();
    upsert_post(db.pool(), &post("two", 100, vec![comment("x", "on two")]))
        .await
        .unwrap();

    let window = fetch_window(db.pool(), 0, 10).await.unwrap();
    assert_eq!(window.posts[0].comments.len(), 2);
    assert_eq!(window.posts[1].comments.len(), 1);
    assert_eq!(window.posts[1].comments[0].body, "on two");
}

#[tokio::test]
async fn test_reads_during_writes_never_see_partial_posts() {
    let (db, _temp_dir) = setup_db().await;

    let writer_db = db.clone();
    let writer = tokio::spawn(async move {
        for i in 0..30 {
            let comments = (0..5).map(|c| comment(&format!("c{c}"), "text")).collect();
            upsert_post(writer_db.pool(), &post(&format!("p{i}"), i, comments))
                .await
                .unwrap();
        }
    });

    while !writer.is_finished() {
        let window = fetch_window(db.pool(), 0, 50).await.unwrap();
        assert_eq!(window.posts.len() as u64, window.total);
        for p in &window.posts {
            assert_eq!(p.comments.len(), 5, "post {} was torn", p.id);
        }
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    assert_eq!(count_posts(&db).await, 30);
}

#[tokio::test]
async fn test_get_post_pairs_post_with_its_own_comments() {
    let (db, _temp_dir) = setup_db().await;

    let revision = |n: usize| {
        let version = format!("v{n}");
        let comments = (0..5).map(|c| comment(&format!("c{c}"), &version)).collect();
        let mut post = post("hot", 100, comments);
        post.title = version;
        post
    };
    upsert_post(db.pool(), &revision(0)).await.unwrap();

    let writer_db = db.clone();
    let writer = tokio::spawn(async move {
        for n in 1..=30 {
            upsert_post(writer_db.pool(), &revision(n)).await.unwrap();
        }
    });

    while !writer.is_finished() {
        let stored = get_post(db.pool(), "hot").await.unwrap().unwrap();
        for c in &stored.comments {
            assert_eq!(c.body, stored.title, "comment {} from another revision", c.id);
        }
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    let last = get_post(db.pool(), "hot").await.unwrap().unwrap();
    assert_eq!(last.title, "v30");
    assert_eq!(count_posts(&db).await, 1);
}
