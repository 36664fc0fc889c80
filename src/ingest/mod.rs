//! Pull hot posts from upstream, normalize them and write them to the store.

pub mod normalize;
pub mod reddit;
pub mod translate;

pub use normalize::{normalize, normalize_comment};
pub use reddit::RedditClient;
pub use translate::{ChatTranslator, Translator};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::constants::MAX_INGEST_BACKOFF_SECS;
use crate::error::FeedError;
use crate::model::{Post, PostType};
use crate::store::{FeedStore, UpsertOutcome};

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Ingestion pipeline: upstream listing → normalize → translate → store.
pub struct Ingestor {
    upstream: RedditClient,
    store: Arc<dyn FeedStore>,
    translator: Option<Arc<dyn Translator>>,
    subreddit: String,
    batch_size: u32,
    run_lock: Mutex<()>,
}

impl Ingestor {
    #[must_use]
    pub fn new(
        upstream: RedditClient,
        store: Arc<dyn FeedStore>,
        translator: Option<Arc<dyn Translator>>,
        subreddit: impl Into<String>,
        batch_size: u32,
    ) -> Self {
        Self {
            upstream,
            store,
            translator,
            subreddit: subreddit.into(),
            batch_size,
            run_lock: Mutex::new(()),
        }
    }

    /// Build the pipeline from configuration. `Ok(None)` when no upstream
    /// credentials are configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &Config, store: Arc<dyn FeedStore>) -> anyhow::Result<Option<Self>> {
        let Some(credentials) = config.reddit.clone() else {
            return Ok(None);
        };
        let upstream = RedditClient::new(config, credentials)?;
        let translator = ChatTranslator::from_config(config)?
            .map(|t| Arc::new(t) as Arc<dyn Translator>);

        Ok(Some(Self::new(
            upstream,
            store,
            translator,
            config.subreddit.clone(),
            config.ingest_batch_size,
        )))
    }

    /// Run one ingestion pass. Concurrent calls are serialized.
    ///
    /// Per-post failures skip that post; the rest of the batch still lands.
    ///
    /// # Errors
    ///
    /// `UpstreamFetch` if the listing cannot be fetched (nothing is written) or
    /// if a comment fetch is refused for auth, rate limit, network or 5xx
    /// reasons. `StoreUnavailable` if the store fails mid-batch. Posts written
    /// before an abort stay committed.
    pub async fn run_once(&self) -> Result<IngestReport, FeedError> {
        let _guard = self.run_lock.lock().await;

        let raw_posts = self
            .upstream
            .hot_posts(&self.subreddit, self.batch_size)
            .await?;

        let mut report = IngestReport {
            fetched: raw_posts.len(),
            ..IngestReport::default()
        };

        for raw in &raw_posts {
            match self.ingest_post(raw).await {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
                Err(e) if e.aborts_run() => {
                    warn!(
                        error = %e,
                        inserted = report.inserted,
                        updated = report.updated,
                        "Aborting ingestion run"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "Skipping upstream post");
                    report.skipped += 1;
                }
            }
        }

        info!(
            subreddit = %self.subreddit,
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            "Ingestion run complete"
        );
        Ok(report)
    }

    async fn ingest_post(&self, raw: &Value) -> Result<UpsertOutcome, FeedError> {
        let id = normalize::upstream_id(raw)
            .ok_or_else(|| FeedError::skip("post has no id"))?
            .to_string();

        let raw_comments = self.upstream.comments(&id).await?;
        let mut post = normalize(raw, &raw_comments)?;

        if let Some(translator) = &self.translator {
            self.fill_translations(translator.as_ref(), &mut post).await;
        }

        let outcome = self
            .store
            .upsert_post(&post)
            .await
            .map_err(FeedError::StoreUnavailable)?;
        debug!(post_id = %post.id, ?outcome, comments = post.comments.len(), "Stored post");
        Ok(outcome)
    }

    /// Fill missing translated fields, reusing stored translations whose
    /// source text is unchanged.
    async fn fill_translations(&self, translator: &dyn Translator, post: &mut Post) {
        let existing = match self.store.get_post(&post.id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "Could not load stored translations");
                None
            }
        };

        if post.title_translated.is_none() {
            let reuse = existing
                .as_ref()
                .filter(|old| old.title == post.title)
                .and_then(|old| old.title_translated.clone());
            post.title_translated = match reuse {
                Some(t) => Some(t),
                None => translate_text(translator, &post.title).await,
            };
        }

        if post.body_translated.is_none() && body_is_prose(post.post_type) {
            let reuse = existing
                .as_ref()
                .filter(|old| old.body == post.body)
                .and_then(|old| old.body_translated.clone());
            post.body_translated = match reuse {
                Some(t) => Some(t),
                None => translate_text(translator, &post.body).await,
            };
        }

        let stored_comments: HashMap<&str, (&str, Option<&str>)> = existing
            .as_ref()
            .map(|old| {
                old.comments
                    .iter()
                    .map(|c| (c.id.as_str(), (c.body.as_str(), c.body_translated.as_deref())))
                    .collect()
            })
            .unwrap_or_default();

        for comment in post.comments.iter_mut().filter(|c| c.body_translated.is_none()) {
            comment.body_translated = match stored_comments.get(comment.id.as_str()) {
                Some((body, Some(translated))) if *body == comment.body => {
                    Some((*translated).to_string())
                }
                _ => translate_text(translator, &comment.body).await,
            };
        }
    }
}

/// Whether `body` holds human text worth translating for this post type.
fn body_is_prose(post_type: PostType) -> bool {
    match post_type {
        PostType::SelfText | PostType::Poll => true,
        PostType::Link
        | PostType::Image
        | PostType::Video
        | PostType::Gallery
        | PostType::Unknown => false,
    }
}

async fn translate_text(translator: &dyn Translator, text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    match translator.translate(text).await {
        Ok(translated) => Some(translated),
        Err(e) => {
            warn!(error = %e, "Translation failed, keeping original text only");
            None
        }
    }
}

/// Run ingestion forever, backing off after retryable failures.
pub async fn ingest_loop(ingestor: Arc<Ingestor>, interval: Duration) {
    let mut consecutive_failures = 0u32;

    loop {
        let delay = match ingestor.run_once().await {
            Ok(_) => {
                consecutive_failures = 0;
                interval
            }
            Err(e) if e.is_retryable() => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                let mut delay = backoff_delay(interval, consecutive_failures);
                if let Some(retry_after) = e.retry_after() {
                    delay = delay.max(retry_after);
                }
                warn!(
                    error = %e,
                    consecutive_failures,
                    retry_in_secs = delay.as_secs(),
                    "Ingestion failed, backing off"
                );
                delay
            }
            Err(e) => {
                error!("Ingestion error: {e:#}");
                interval
            }
        };

        tokio::time::sleep(delay).await;
    }
}

/// Delay before the next run after `failures` consecutive retryable failures.
///
/// Doubles per failure up to [`MAX_INGEST_BACKOFF_SECS`] (or `base`, if larger),
/// plus up to 10% jitter.
#[must_use]
pub fn backoff_delay(base: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return base;
    }
    let cap = base.max(Duration::from_secs(MAX_INGEST_BACKOFF_SECS));
    let factor = 2u32.saturating_pow(failures.min(16));
    let delay = base.saturating_mul(factor).min(cap);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..0.1);
    delay + delay.mul_f64(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let base = Duration::from_secs(60);
        assert_eq!(backoff_delay(base, 0), base);

        let first = backoff_delay(base, 1);
        assert!(first >= Duration::from_secs(120) && first < Duration::from_secs(133));

        let capped = backoff_delay(base, 30);
        assert!(capped >= Duration::from_secs(MAX_INGEST_BACKOFF_SECS));
        assert!(capped <= Duration::from_secs(MAX_INGEST_BACKOFF_SECS).mul_f64(1.1));
    }

    #[test]
    fn test_backoff_never_below_base() {
        let base = Duration::from_secs(2 * MAX_INGEST_BACKOFF_SECS);
        assert!(backoff_delay(base, 3) >= base);
    }

    #[test]
    fn test_gallery_bodies_are_not_translated() {
        assert!(!body_is_prose(PostType::Gallery));
        assert!(!body_is_prose(PostType::Unknown));
        assert!(!body_is_prose(PostType::Link));
        assert!(body_is_prose(PostType::SelfText));
        assert!(body_is_prose(PostType::Poll));
    }
}
