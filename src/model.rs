//! Canonical post model shared by ingestion, storage, the query API and the reader.

use serde::{Deserialize, Serialize};

/// Kind of content a post carries.
///
/// Upstream shapes that match none of the known kinds become [`PostType::Unknown`],
/// which renders as a neutral placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[serde(rename = "self")]
    SelfText,
    Link,
    Image,
    Video,
    Gallery,
    Poll,
    Unknown,
}

impl PostType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfText => "self",
            Self::Link => "link",
            Self::Image => "image",
            Self::Video => "video",
            Self::Gallery => "gallery",
            Self::Poll => "poll",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a stored type name. Anything unrecognised maps to `Unknown`.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "self" => Self::SelfText,
            "link" => Self::Link,
            "image" => Self::Image,
            "video" => Self::Video,
            "gallery" => Self::Gallery,
            "poll" => Self::Poll,
            _ => Self::Unknown,
        }
    }

    /// Whether `url` is meaningful for this type.
    #[must_use]
    pub fn carries_url(&self) -> bool {
        matches!(self, Self::Link | Self::Image | Self::Video)
    }
}

/// A normalized post with its flat comment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub title_translated: Option<String>,
    pub body: String,
    pub body_translated: Option<String>,
    pub post_type: PostType,
    pub author: String,
    /// Upstream creation time, epoch seconds.
    pub created_at: i64,
    pub score: i64,
    pub num_comments: i64,
    pub upvote_ratio: Option<f64>,
    pub url: String,
    pub comments: Vec<Comment>,
}

impl Post {
    /// Title to show: the translation when non-empty, else the original.
    #[must_use]
    pub fn display_title(&self) -> &str {
        prefer_translated(&self.title, self.title_translated.as_deref())
    }

    #[must_use]
    pub fn display_body(&self) -> &str {
        prefer_translated(&self.body, self.body_translated.as_deref())
    }

    /// Image URLs of a gallery post, in upstream order.
    ///
    /// Returns `None` for other post types or when the body is not a JSON list of strings.
    #[must_use]
    pub fn gallery_urls(&self) -> Option<Vec<String>> {
        match self.post_type {
            PostType::Gallery => serde_json::from_str(&self.body).ok(),
            _ => None,
        }
    }
}

/// A comment owned by exactly one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub created_at: i64,
    pub score: i64,
    pub body: String,
    pub body_translated: Option<String>,
}

impl Comment {
    #[must_use]
    pub fn display_body(&self) -> &str {
        prefer_translated(&self.body, self.body_translated.as_deref())
    }
}

/// One page of the feed, as returned by `GET /api/post`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub has_more: bool,
}

impl FeedPage {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            posts: Vec::new(),
            has_more: false,
        }
    }
}

/// Pick the translated text when it is present and non-empty.
#[must_use]
pub fn prefer_translated<'a>(original: &'a str, translated: Option<&'a str>) -> &'a str {
    match translated {
        Some(t) if !t.is_empty() => t,
        _ => original,
    }
}
