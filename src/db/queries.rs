use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqlitePool};

use super::models::{CommentRow, PostRow};
use crate::model::{Comment, Post};
use crate::store::{content_hash, PostWindow, UpsertOutcome};

// ========== Posts ==========

/// Insert or update a post together with its comments in one transaction.
///
/// Comments keep the position they were first ingested at; comments missing
/// from `post.comments` are left in place.
pub async fn upsert_post(pool: &SqlitePool, post: &Post) -> Result<UpsertOutcome> {
    let hash = content_hash(post);

    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin upsert transaction")?;

    let existing: Option<(i64, String)> =
        sqlx::query_as("SELECT id, content_hash FROM posts WHERE external_id = ?")
            .bind(&post.id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to look up existing post")?;

    let outcome = match &existing {
        Some((_, stored_hash)) if *stored_hash == hash => {
            tx.commit().await.context("Failed to commit upsert")?;
            return Ok(UpsertOutcome::Unchanged);
        }
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Inserted,
    };

    sqlx::query(
        r"
        INSERT INTO posts (
            external_id, title, title_translated, body, body_translated, post_type,
            author, created_at, score, num_comments, upvote_ratio, url, content_hash
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(external_id) DO UPDATE SET
            title = excluded.title,
            title_translated = excluded.title_translated,
            body = excluded.body,
            body_translated = excluded.body_translated,
            post_type = excluded.post_type,
            author = excluded.author,
            created_at = excluded.created_at,
            score = excluded.score,
            num_comments = excluded.num_comments,
            upvote_ratio = excluded.upvote_ratio,
            url = excluded.url,
            content_hash = excluded.content_hash,
            updated_at = datetime('now')
        ",
    )
    .bind(&post.id)
    .bind(&post.title)
    .bind(&post.title_translated)
    .bind(&post.body)
    .bind(&post.body_translated)
    .bind(post.post_type.as_str())
    .bind(&post.author)
    .bind(post.created_at)
    .bind(post.score)
    .bind(post.num_comments)
    .bind(post.upvote_ratio)
    .bind(&post.url)
    .bind(&hash)
    .execute(&mut *tx)
    .await
    .context("Failed to upsert post")?;

    let post_row_id: i64 = match existing {
        Some((id, _)) => id,
        None => sqlx::query_scalar("SELECT id FROM posts WHERE external_id = ?")
            .bind(&post.id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read back post id")?,
    };

    for comment in &post.comments {
        upsert_comment(&mut *tx, post_row_id, comment).await?;
    }

    tx.commit().await.context("Failed to commit upsert")?;

    Ok(outcome)
}

async fn upsert_comment(conn: &mut SqliteConnection, post_id: i64, comment: &Comment) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO comments (
            post_id, external_id, position, author, created_at, score, body, body_translated
        )
        VALUES (
            ?, ?,
            (SELECT COALESCE(MAX(position) + 1, 0) FROM comments WHERE post_id = ?),
            ?, ?, ?, ?, ?
        )
        ON CONFLICT(post_id, external_id) DO UPDATE SET
            author = excluded.author,
            score = excluded.score,
            body = excluded.body,
            body_translated = excluded.body_translated
        ",
    )
    .bind(post_id)
    .bind(&comment.id)
    .bind(post_id)
    .bind(&comment.author)
    .bind(comment.created_at)
    .bind(comment.score)
    .bind(&comment.body)
    .bind(&comment.body_translated)
    .execute(conn)
    .await
    .with_context(|| format!("Failed to upsert comment {}", comment.id))?;

    Ok(())
}

/// Fetch one feed window and the total count from a single read snapshot.
pub async fn fetch_window(pool: &SqlitePool, offset: u64, limit: u32) -> Result<PostWindow> {
    let offset = i64::try_from(offset).context("Offset out of range")?;

    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin read transaction")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count posts")?;

    let rows: Vec<PostRow> = sqlx::query_as(
        r"
        SELECT * FROM posts
        ORDER BY created_at DESC, external_id ASC
        LIMIT ? OFFSET ?
        ",
    )
    .bind(i64::from(limit))
    .bind(offset)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to fetch feed window")?;

    let mut comments = comments_for_posts(&mut *tx, &rows).await?;

    tx.commit().await.context("Failed to end read transaction")?;

    let posts = rows
        .into_iter()
        .map(|row| {
            let attached = comments.remove(&row.id).unwrap_or_default();
            row.into_post(attached)
        })
        .collect();

    Ok(PostWindow {
        posts,
        total: u64::try_from(total).unwrap_or(0),
    })
}

/// Get a post by its upstream id, with comments, from a single read snapshot.
pub async fn get_post(pool: &SqlitePool, external_id: &str) -> Result<Option<Post>> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin read transaction")?;

    let row: Option<PostRow> = sqlx::query_as("SELECT * FROM posts WHERE external_id = ?")
        .bind(external_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch post by id")?;

    let post = match row {
        Some(row) => {
            let mut comments = comments_for_posts(&mut *tx, std::slice::from_ref(&row)).await?;
            let attached = comments.remove(&row.id).unwrap_or_default();
            Some(row.into_post(attached))
        }
        None => None,
    };

    tx.commit().await.context("Failed to end read transaction")?;
    Ok(post)
}

// ========== Comments ==========

/// Load comments for the given posts, grouped by post row id, in stored order.
async fn comments_for_posts(
    conn: &mut SqliteConnection,
    posts: &[PostRow],
) -> Result<HashMap<i64, Vec<Comment>>> {
    let mut grouped: HashMap<i64, Vec<Comment>> = HashMap::new();
    if posts.is_empty() {
        return Ok(grouped);
    }

    let placeholders = vec!["?"; posts.len()].join(", ");
    let sql = format!(
        "SELECT * FROM comments WHERE post_id IN ({placeholders}) ORDER BY post_id, position"
    );

    let mut query = sqlx::query_as::<_, CommentRow>(&sql);
    for post in posts {
        query = query.bind(post.id);
    }

    let rows = query
        .fetch_all(conn)
        .await
        .context("Failed to fetch comments")?;

    for row in rows {
        grouped.entry(row.post_id).or_default().push(row.into());
    }

    Ok(grouped)
}
