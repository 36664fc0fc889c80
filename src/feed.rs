//! Stateless paginated access to the feed.

use std::sync::Arc;

use tracing::debug;

use crate::error::FeedError;
use crate::model::FeedPage;
use crate::store::FeedStore;

/// Serves fixed-size pages of the feed from a [`FeedStore`].
///
/// Holds no per-request state; clones share the same store.
#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn FeedStore>,
}

impl FeedService {
    #[must_use]
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn FeedStore> {
        &self.store
    }

    /// Return page `page_number` (1-based) of `page_size` posts.
    ///
    /// `has_more` is computed against a count taken in the same snapshot as
    /// the page itself, and is re-evaluated on every call.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for `page_number < 1` or `page_size <= 0`,
    /// `StoreUnavailable` if the store fails.
    pub async fn get_page(&self, page_number: i64, page_size: i64) -> Result<FeedPage, FeedError> {
        if page_number < 1 {
            return Err(FeedError::InvalidArgument(format!(
                "page must be at least 1, got {page_number}"
            )));
        }
        let limit = u32::try_from(page_size)
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| {
                FeedError::InvalidArgument(format!("page size must be positive, got {page_size}"))
            })?;
        let Some(offset) = (page_number - 1)
            .unsigned_abs()
            .checked_mul(u64::from(limit))
            .filter(|o| i64::try_from(*o).is_ok())
        else {
            // No store can hold that many posts.
            debug!(page = page_number, "Page lies past any possible feed end");
            return Ok(FeedPage::empty());
        };

        let window = self
            .store
            .fetch_window(offset, limit)
            .await
            .map_err(FeedError::StoreUnavailable)?;

        let has_more = offset + (window.posts.len() as u64) < window.total;
        debug!(
            page = page_number,
            items = window.posts.len(),
            total = window.total,
            has_more,
            "Served feed page"
        );

        Ok(FeedPage {
            posts: window.posts,
            has_more,
        })
    }
}
