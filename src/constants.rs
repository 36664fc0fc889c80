//! Shared constants used across the application.

/// Number of posts per feed page served by `GET /api/post`.
pub const FEED_PAGE_SIZE: u32 = 10;

/// Default user agent for upstream API requests.
pub const DEFAULT_USER_AGENT: &str = "community-feed/0.1";

/// Refresh an access token this long before the upstream says it expires.
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// Upper bound for the ingestion scheduler's backoff delay.
pub const MAX_INGEST_BACKOFF_SECS: u64 = 3600;

/// Comment ids expanded per `morechildren` request (upstream maximum).
pub const MORE_CHILDREN_BATCH: usize = 100;

/// `morechildren` requests allowed per post before the rest is left unexpanded.
pub const MAX_MORE_CHILDREN_REQUESTS: usize = 20;
