//! Client-side feed reader: an append-only list of posts that grows one page
//! at a time in response to proximity signals.
//!
//! The reader is driven from a single task. Page fetches are split in three
//! steps so an event loop can keep handling input while a request is out:
//!
//! 1. [`FeedReader::on_proximity`] / [`FeedReader::begin_fetch`] move the
//!    reader to `Loading` and hand out a [`PageTicket`];
//! 2. [`FeedReader::request`] turns the ticket into a `'static` future;
//! 3. [`FeedReader::complete`] applies the response.
//!
//! Only one ticket is outstanding at a time. [`FeedReader::advance`] runs all
//! three steps inline.

mod selection;
mod source;

pub use selection::Selection;
pub use source::{FetchError, HttpPageSource, PageSource};

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::{FeedPage, Post};

/// Default deadline for a single page request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Loading,
    Error,
    Exhausted,
}

/// Permission to fetch one page, issued when the reader enters `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    generation: u64,
    page: u32,
}

impl PageTicket {
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Outcome of a ticket's request, fed back through [`FeedReader::complete`].
#[derive(Debug)]
pub struct PageResponse {
    pub ticket: PageTicket,
    pub result: Result<FeedPage, FetchError>,
}

pub struct FeedReader<S> {
    source: Arc<S>,
    timeout: Duration,
    accumulated: Vec<Post>,
    seen: HashSet<String>,
    next_page: u32,
    state: ReaderState,
    last_error: Option<FetchError>,
    generation: u64,
    cancel: CancellationToken,
}

impl<S: PageSource + 'static> FeedReader<S> {
    #[must_use]
    pub fn new(source: Arc<S>) -> Self {
        Self::with_timeout(source, DEFAULT_FETCH_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(source: Arc<S>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            accumulated: Vec::new(),
            seen: HashSet::new(),
            next_page: 1,
            state: ReaderState::Idle,
            last_error: None,
            generation: 0,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.accumulated
    }

    #[must_use]
    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// The very first page could not be loaded, so there is nothing to show
    /// but an empty/error feed.
    #[must_use]
    pub fn first_page_failed(&self) -> bool {
        self.state == ReaderState::Error && self.next_page == 1 && self.accumulated.is_empty()
    }

    /// Enter `Loading` for the next page. `None` unless the reader is `Idle`,
    /// or in `Error` (a retry of the same page).
    pub fn begin_fetch(&mut self) -> Option<PageTicket> {
        match self.state {
            ReaderState::Idle | ReaderState::Error => {
                self.state = ReaderState::Loading;
                Some(PageTicket {
                    generation: self.generation,
                    page: self.next_page,
                })
            }
            ReaderState::Loading | ReaderState::Exhausted => None,
        }
    }

    /// Proximity signal observed on the item `last_id`. Ignored unless that
    /// item is still the last accumulated post.
    pub fn on_proximity(&mut self, last_id: &str) -> Option<PageTicket> {
        let current_last = self.accumulated.last().map(|p| p.id.as_str());
        if current_last != Some(last_id) {
            debug!(signal = last_id, ?current_last, "Ignoring stale proximity signal");
            return None;
        }
        self.begin_fetch()
    }

    /// Request the ticket's page. The future owns everything it needs, fails
    /// with [`FetchError::Timeout`] after the reader's deadline, and with
    /// [`FetchError::Cancelled`] once the reader is reset.
    pub fn request(&self, ticket: PageTicket) -> impl Future<Output = PageResponse> + Send + 'static {
        let source = Arc::clone(&self.source);
        let cancel = self.cancel.clone();
        let timeout = self.timeout;

        async move {
            let result = tokio::select! {
                () = cancel.cancelled() => Err(FetchError::Cancelled),
                r = tokio::time::timeout(timeout, source.fetch_page(ticket.page)) => {
                    r.unwrap_or(Err(FetchError::Timeout))
                }
            };
            PageResponse { ticket, result }
        }
    }

    /// Apply a response. Returns `false` if it was stale and ignored.
    pub fn complete(&mut self, response: PageResponse) -> bool {
        let PageResponse { ticket, result } = response;
        if ticket.generation != self.generation
            || ticket.page != self.next_page
            || self.state != ReaderState::Loading
        {
            debug!(page = ticket.page, "Dropping stale page response");
            return false;
        }

        match result {
            Ok(page) => {
                let received = page.posts.len();
                for post in page.posts {
                    if self.seen.insert(post.id.clone()) {
                        self.accumulated.push(post);
                    }
                }
                self.next_page += 1;
                self.last_error = None;
                self.state = if page.has_more {
                    ReaderState::Idle
                } else {
                    ReaderState::Exhausted
                };
                debug!(
                    page = ticket.page,
                    received,
                    total = self.accumulated.len(),
                    state = ?self.state,
                    "Applied feed page"
                );
            }
            Err(e) => {
                debug!(page = ticket.page, error = %e, "Feed page request failed");
                self.last_error = Some(e);
                self.state = ReaderState::Error;
            }
        }
        true
    }

    /// Load page 1. No-op once anything has been loaded.
    pub async fn start(&mut self) -> bool {
        if self.next_page != 1 {
            return false;
        }
        self.advance().await
    }

    /// Fetch and apply the next page if the reader is ready for one.
    pub async fn advance(&mut self) -> bool {
        let Some(ticket) = self.begin_fetch() else {
            return false;
        };
        let response = self.request(ticket).await;
        self.complete(response)
    }

    /// Drop everything loaded so far and return to `Idle` at page 1. Any
    /// request still out is cancelled and its response will be ignored.
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
        self.accumulated.clear();
        self.seen.clear();
        self.next_page = 1;
        self.last_error = None;
        self.state = ReaderState::Idle;
    }

    /// [`reset`](Self::reset) followed by [`start`](Self::start).
    pub async fn reload(&mut self) -> bool {
        self.reset();
        self.start().await
    }
}

/// One viewer's feed: the reader plus whatever post is open.
pub struct FeedSession<S> {
    pub reader: FeedReader<S>,
    pub selection: Selection,
}

impl<S: PageSource + 'static> FeedSession<S> {
    #[must_use]
    pub fn new(reader: FeedReader<S>) -> Self {
        Self {
            reader,
            selection: Selection::new(),
        }
    }

    /// Start over, e.g. after a locale switch.
    pub async fn reload(&mut self) -> bool {
        self.selection.clear();
        self.reader.reload().await
    }
}
