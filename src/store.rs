//! The feed store contract and an in-process implementation.
//!
//! The SQLite implementation lives in [`crate::db`].

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::model::Post;

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// A slice of the feed plus the total post count, taken from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PostWindow {
    pub posts: Vec<Post>,
    pub total: u64,
}

/// Persistence collaborator for the feed.
///
/// Implementations must write a post and its comments as one atomic unit and
/// must order windows by `created_at` descending, then `id` ascending.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Insert a post or update it in place, keyed by `post.id`.
    async fn upsert_post(&self, post: &Post) -> Result<UpsertOutcome>;

    /// Up to `limit` posts starting at `offset`, with comments attached.
    async fn fetch_window(&self, offset: u64, limit: u32) -> Result<PostWindow>;

    /// Look up a single post with its comments.
    async fn get_post(&self, id: &str) -> Result<Option<Post>>;
}

/// Total feed order: newest first, ties broken by id.
#[must_use]
pub fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// SHA-256 over the serialized post, used to detect unchanged re-ingests.
#[must_use]
pub fn content_hash(post: &Post) -> String {
    let bytes = serde_json::to_vec(post).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Feed store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

#[derive(Debug)]
struct MemoryEntry {
    post: Post,
    /// Hash of the last written post, before comment merging.
    hash: String,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn upsert_post(&self, post: &Post) -> Result<UpsertOutcome> {
        let hash = content_hash(post);
        let mut entries = self.entries.write().await;

        let entry = match entries.entry(post.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(MemoryEntry {
                    post: post.clone(),
                    hash,
                });
                return Ok(UpsertOutcome::Inserted);
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };
        if entry.hash == hash {
            return Ok(UpsertOutcome::Unchanged);
        }

        let mut comments = std::mem::take(&mut entry.post.comments);
        for comment in &post.comments {
            match comments.iter_mut().find(|c| c.id == comment.id) {
                Some(slot) => *slot = comment.clone(),
                None => comments.push(comment.clone()),
            }
        }
        entry.post = Post {
            comments,
            ..post.clone()
        };
        entry.hash = hash;
        Ok(UpsertOutcome::Updated)
    }

    async fn fetch_window(&self, offset: u64, limit: u32) -> Result<PostWindow> {
        let entries = self.entries.read().await;
        let mut ordered: Vec<&Post> = entries.values().map(|e| &e.post).collect();
        ordered.sort_by(|a, b| feed_order(a, b));

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let window = ordered
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(PostWindow {
            posts: window,
            total: entries.len() as u64,
        })
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        Ok(self.entries.read().await.get(id).map(|e| e.post.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, PostType};

    fn post(id: &str, created_at: i64) -> Post {
        Post {
            id: id.to_string(),
            title: format!("title {id}"),
            title_translated: None,
            body: String::new(),
            body_translated: None,
            post_type: PostType::SelfText,
            author: "someone".to_string(),
            created_at,
            score: 1,
            num_comments: 0,
            upvote_ratio: Some(0.9),
            url: String::new(),
            comments: Vec::new(),
        }
    }

    fn comment(id: &str, body: &str) -> Comment {
        Comment {
            id: id.to_string(),
            author: "c".to_string(),
            created_at: 1,
            score: 0,
            body: body.to_string(),
            body_translated: None,
        }
    }

    #[tokio::test]
    async fn test_equal_timestamps_break_ties_by_id() {
        let store = MemoryStore::new();
        for id in ["b", "c", "a"] {
            store.upsert_post(&post(id, 100)).await.unwrap();
        }
        store.upsert_post(&post("z", 200)).await.unwrap();

        let window = store.fetch_window(0, 10).await.unwrap();
        let ids: Vec<_> = window.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["z", "a", "b", "c"]);
        assert_eq!(window.total, 4);
    }

    #[tokio::test]
    async fn test_reupsert_updates_in_place() {
        let store = MemoryStore::new();
        let mut p = post("a", 1);
        p.comments = vec![comment("c1", "first"), comment("c2", "second")];
        assert_eq!(store.upsert_post(&p).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_post(&p).await.unwrap(), UpsertOutcome::Unchanged);

        p.title = "edited".to_string();
        p.comments = vec![comment("c3", "third"), comment("c1", "first, edited")];
        assert_eq!(store.upsert_post(&p).await.unwrap(), UpsertOutcome::Updated);

        let stored = store.get_post("a").await.unwrap().unwrap();
        assert_eq!(stored.title, "edited");
        let bodies: Vec<_> = stored.comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, ["first, edited", "second", "third"]);
        assert_eq!(store.fetch_window(0, 10).await.unwrap().total, 1);
    }
}
