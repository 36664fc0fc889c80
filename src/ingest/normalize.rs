//! Map raw upstream post and comment objects onto the canonical model.
//!
//! Upstream objects arrive as untyped JSON because their shape depends on the
//! kind of submission. Both bare objects and `{"kind": .., "data": {..}}`
//! listing wrappers are accepted.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::model::{Comment, Post, PostType};

const TITLE_TRANSLATED_KEYS: &[&str] = &["titleTranslated", "title_translated", "titleZh", "title_zh"];
const BODY_TRANSLATED_KEYS: &[&str] = &["bodyTranslated", "body_translated", "contentZh", "content_zh"];
const BODY_KEYS: &[&str] = &["selftext", "body", "content"];
const CREATED_KEYS: &[&str] = &["created_utc", "createdUtc", "createdAt", "created"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Normalize one upstream post and its comments.
///
/// Shapes that match no known post type become [`PostType::Unknown`]. Comments
/// that cannot be read are dropped with a warning.
///
/// # Errors
///
/// Returns [`FeedError::NormalizationSkip`] only when the post has no usable id.
pub fn normalize(raw_post: &Value, raw_comments: &[Value]) -> Result<Post, FeedError> {
    let obj = unwrap_listing(raw_post)
        .as_object()
        .ok_or_else(|| FeedError::skip("post is not a JSON object"))?;

    let id = upstream_id(raw_post)
        .ok_or_else(|| FeedError::skip("post has no id"))?
        .to_string();

    let selftext = str_field(obj, BODY_KEYS).unwrap_or_default();
    let url = str_field(obj, &["url"]).unwrap_or_default();
    let body_translated = str_field(obj, BODY_TRANSLATED_KEYS);

    let (post_type, body, body_translated, url) = match detect_type(obj) {
        PostType::SelfText => (PostType::SelfText, selftext.to_string(), body_translated, ""),
        PostType::Poll => (PostType::Poll, selftext.to_string(), body_translated, ""),
        PostType::Link => (PostType::Link, selftext.to_string(), body_translated, url),
        PostType::Image => (PostType::Image, selftext.to_string(), body_translated, url),
        PostType::Video => {
            let media_url = obj
                .get("media")
                .and_then(|m| m.pointer("/reddit_video/fallback_url"))
                .and_then(Value::as_str)
                .unwrap_or(url);
            (PostType::Video, selftext.to_string(), body_translated, media_url)
        }
        PostType::Gallery => match gallery_urls(obj, body_translated) {
            Ok(urls) => {
                let encoded = serde_json::to_string(&urls).unwrap_or_else(|_| "[]".to_string());
                (PostType::Gallery, encoded, None, "")
            }
            Err(reason) => {
                warn!(post_id = %id, reason = %reason, "Unreadable gallery, treating post as unknown");
                (PostType::Unknown, selftext.to_string(), None, "")
            }
        },
        PostType::Unknown => {
            debug!(post_id = %id, "No known post shape matched");
            (PostType::Unknown, selftext.to_string(), body_translated, "")
        }
    };

    let comments = normalize_comments(&id, raw_comments);

    Ok(Post {
        title: str_field(obj, &["title"]).unwrap_or_default().to_string(),
        title_translated: str_field(obj, TITLE_TRANSLATED_KEYS).map(str::to_string),
        body,
        body_translated: body_translated.map(str::to_string),
        post_type,
        author: author(obj),
        created_at: int_field(obj, CREATED_KEYS).unwrap_or(0),
        score: int_field(obj, &["score"]).unwrap_or(0),
        num_comments: int_field(obj, &["num_comments", "numComments"]).unwrap_or(0),
        upvote_ratio: obj
            .get("upvote_ratio")
            .or_else(|| obj.get("upvoteRatio"))
            .and_then(Value::as_f64)
            .filter(|r| (0.0..=1.0).contains(r)),
        url: url.to_string(),
        comments,
        id,
    })
}

/// Normalize a single upstream comment.
///
/// # Errors
///
/// Returns [`FeedError::NormalizationSkip`] for `more` placeholders and for
/// comments without an id or body.
pub fn normalize_comment(raw: &Value) -> Result<Comment, FeedError> {
    if raw.get("kind").and_then(Value::as_str) == Some("more") {
        return Err(FeedError::skip("comment is a 'more' placeholder"));
    }
    let obj = unwrap_listing(raw)
        .as_object()
        .ok_or_else(|| FeedError::skip("comment is not a JSON object"))?;

    let id = str_field(obj, &["id", "redditId"])
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FeedError::skip("comment has no id"))?;
    let body = str_field(obj, &["body", "content"])
        .ok_or_else(|| FeedError::skip(format!("comment {id} has no body")))?;

    Ok(Comment {
        id: id.to_string(),
        author: author(obj),
        created_at: int_field(obj, CREATED_KEYS).unwrap_or(0),
        score: int_field(obj, &["score"]).unwrap_or(0),
        body: body.to_string(),
        body_translated: str_field(obj, BODY_TRANSLATED_KEYS).map(str::to_string),
    })
}

fn normalize_comments(post_id: &str, raw_comments: &[Value]) -> Vec<Comment> {
    let mut seen = HashSet::new();
    let mut comments = Vec::with_capacity(raw_comments.len());

    for raw in raw_comments {
        match normalize_comment(raw) {
            Ok(comment) => {
                if seen.insert(comment.id.clone()) {
                    comments.push(comment);
                } else {
                    debug!(post_id, comment_id = %comment.id, "Dropping repeated comment");
                }
            }
            Err(e) => warn!(post_id, error = %e, "Dropping comment"),
        }
    }

    comments
}

/// Decide the post type from the discriminating upstream fields.
fn detect_type(obj: &Map<String, Value>) -> PostType {
    let hint = str_field(obj, &["post_hint"]).unwrap_or_default();
    let url = str_field(obj, &["url"]).unwrap_or_default();
    let has_http_url = url.starts_with("http://") || url.starts_with("https://");
    let has_body = str_field(obj, BODY_KEYS).is_some_and(|s| !s.is_empty());
    // Stored posts carry no `is_self`; their `url` is the post's own permalink.
    let is_self = obj
        .get("is_self")
        .and_then(Value::as_bool)
        .unwrap_or(has_body);

    if obj.get("poll_data").is_some_and(Value::is_object) {
        PostType::Poll
    } else if flag(obj, "is_gallery") || obj.get("gallery_data").is_some_and(|g| !g.is_null()) {
        PostType::Gallery
    } else if flag(obj, "is_video")
        || matches!(hint, "hosted:video" | "rich:video")
        || obj.get("media").and_then(|m| m.get("reddit_video")).is_some()
    {
        PostType::Video
    } else if hint == "image" || (has_http_url && has_image_extension(url)) {
        PostType::Image
    } else if is_self {
        PostType::SelfText
    } else if has_http_url {
        PostType::Link
    } else if has_body {
        PostType::SelfText
    } else {
        PostType::Unknown
    }
}

/// Ordered image URLs of a gallery.
///
/// A pre-built list in the translated-content field wins; otherwise the list is
/// resolved from `gallery_data` items against `media_metadata`.
fn gallery_urls(obj: &Map<String, Value>, prebuilt: Option<&str>) -> Result<Vec<String>, String> {
    if let Some(encoded) = prebuilt {
        return serde_json::from_str::<Vec<String>>(encoded)
            .map_err(|e| format!("gallery list is not a JSON array of strings: {e}"));
    }

    let items = obj
        .get("gallery_data")
        .and_then(|g| g.get("items"))
        .and_then(Value::as_array)
        .ok_or("gallery has no items")?;
    let metadata = obj.get("media_metadata").and_then(Value::as_object);

    let urls: Vec<String> = items
        .iter()
        .filter_map(|item| {
            let media_id = item.get("media_id")?.as_str()?;
            let source = metadata?.get(media_id)?.get("s")?;
            source
                .get("u")
                .or_else(|| source.get("gif"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect();

    if urls.is_empty() {
        return Err("no gallery item resolved to an image".to_string());
    }
    Ok(urls)
}

/// Upstream identifier of a raw post, if it has a non-empty one.
#[must_use]
pub fn upstream_id(raw: &Value) -> Option<&str> {
    let obj = unwrap_listing(raw).as_object()?;
    str_field(obj, &["id", "redditId"]).filter(|id| !id.is_empty())
}

fn unwrap_listing(raw: &Value) -> &Value {
    match raw.get("data") {
        Some(data) if raw.get("kind").is_some() && data.is_object() => data,
        _ => raw,
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
}

/// Integer field that may be encoded as an integer, a float or a numeric string.
fn int_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Display name of the author. Deleted authors become an empty string.
fn author(obj: &Map<String, Value>) -> String {
    let name = match obj.get("author") {
        Some(Value::String(s)) => s.as_str(),
        Some(Value::Object(o)) => o.get("name").and_then(Value::as_str).unwrap_or_default(),
        _ => "",
    };
    if name == "[deleted]" {
        String::new()
    } else {
        name.to_string()
    }
}

fn has_image_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
