use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the feed pipeline.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Bad pagination input. Not retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The store could not answer. Callers may retry.
    #[error("feed store unavailable: {0:#}")]
    StoreUnavailable(#[source] anyhow::Error),
    /// A single upstream item could not be normalized and was dropped.
    #[error("skipped upstream item: {reason}")]
    NormalizationSkip { reason: String },
    /// The upstream source could not be reached or refused the request.
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(#[from] UpstreamError),
}

impl FeedError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::UpstreamFetch(_))
    }

    /// Delay requested by the upstream source, if it rate limited us.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::UpstreamFetch(UpstreamError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }

    /// Whether an ingestion run must stop here rather than skip the current post.
    ///
    /// Store outages and upstream failures that will hit every following post
    /// (auth, rate limit, network, 5xx) end the run.
    #[must_use]
    pub fn aborts_run(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::UpstreamFetch(e) => match e {
                UpstreamError::Auth(_)
                | UpstreamError::RateLimited { .. }
                | UpstreamError::Network(_) => true,
                UpstreamError::Status(code) => *code >= 500,
                UpstreamError::Decode(_) => false,
            },
            Self::InvalidArgument(_) | Self::NormalizationSkip { .. } => false,
        }
    }

    pub(crate) fn skip(reason: impl Into<String>) -> Self {
        Self::NormalizationSkip {
            reason: reason.into(),
        }
    }
}

/// Errors talking to the upstream community source.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected upstream payload: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!FeedError::InvalidArgument("page".into()).is_retryable());
        assert!(FeedError::StoreUnavailable(anyhow::anyhow!("locked")).is_retryable());
        assert!(FeedError::from(UpstreamError::Status(503)).is_retryable());
        assert!(!FeedError::skip("no id").is_retryable());

        let limited = FeedError::from(UpstreamError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        });
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(FeedError::from(UpstreamError::Status(500)).retry_after(), None);
    }

    #[test]
    fn test_run_aborting_errors() {
        assert!(FeedError::StoreUnavailable(anyhow::anyhow!("locked")).aborts_run());
        assert!(FeedError::from(UpstreamError::Auth("expired".into())).aborts_run());
        assert!(FeedError::from(UpstreamError::RateLimited { retry_after: None }).aborts_run());
        assert!(FeedError::from(UpstreamError::Status(502)).aborts_run());

        assert!(!FeedError::from(UpstreamError::Status(404)).aborts_run());
        assert!(!FeedError::from(UpstreamError::Decode("bad tree".into())).aborts_run());
        assert!(!FeedError::skip("no id").aborts_run());
    }
}
