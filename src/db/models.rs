use crate::model::{Comment, Post, PostType};

/// A row of the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub title_translated: Option<String>,
    pub body: String,
    pub body_translated: Option<String>,
    pub post_type: String,
    pub author: String,
    pub created_at: i64,
    pub score: i64,
    pub num_comments: i64,
    pub upvote_ratio: Option<f64>,
    pub url: String,
    pub content_hash: String,
    pub ingested_at: String,
    pub updated_at: String,
}

impl PostRow {
    /// Convert into the canonical model with the given comments.
    #[must_use]
    pub fn into_post(self, comments: Vec<Comment>) -> Post {
        Post {
            id: self.external_id,
            title: self.title,
            title_translated: self.title_translated,
            body: self.body,
            body_translated: self.body_translated,
            post_type: PostType::from_str_lossy(&self.post_type),
            author: self.author,
            created_at: self.created_at,
            score: self.score,
            num_comments: self.num_comments,
            upvote_ratio: self.upvote_ratio,
            url: self.url,
            comments,
        }
    }
}

/// A row of the `comments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub external_id: String,
    pub position: i64,
    pub author: String,
    pub created_at: i64,
    pub score: i64,
    pub body: String,
    pub body_translated: Option<String>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.external_id,
            author: row.author,
            created_at: row.created_at,
            score: row.score,
            body: row.body,
            body_translated: row.body_translated,
        }
    }
}
