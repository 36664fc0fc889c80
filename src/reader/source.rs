//! Where the reader gets its pages from.

use async_trait::async_trait;
use thiserror::Error;

use crate::constants::FEED_PAGE_SIZE;
use crate::feed::FeedService;
use crate::model::FeedPage;

/// Why a page request did not produce a page. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("page request timed out")]
    Timeout,
    #[error("page request was cancelled")]
    Cancelled,
    #[error("feed endpoint returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("feed service error: {0}")]
    Service(String),
}

/// Something that can hand out 1-based feed pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<FeedPage, FetchError>;
}

#[async_trait]
impl PageSource for FeedService {
    async fn fetch_page(&self, page: u32) -> Result<FeedPage, FetchError> {
        self.get_page(i64::from(page), i64::from(FEED_PAGE_SIZE))
            .await
            .map_err(|e| FetchError::Service(e.to_string()))
    }
}

/// Reads pages from a running server's `GET /api/post` endpoint.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPageSource {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page: u32) -> Result<FeedPage, FetchError> {
        let response = self
            .client
            .get(format!("{}/api/post", self.base_url))
            .query(&[("page", page)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.json().await.map_err(transport_error)
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}
