//! Infinite scroll state.
//!
//! [`InfiniteFeed`] accumulates pages from [`FeedService::fetch_page`] and
//! decides when the next page may be requested. At most one page request is
//! in flight at a time, and nothing is requested once a short page has been
//! seen.

use std::sync::Arc;

use fun_common::AppError;
use fun_db::FeedFilter;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::feed::{FeedPage, FeedPostView, FeedService};

/// Why a page request was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another request is still running.
    InFlight,
    /// The last page was short; there is nothing more to load.
    Exhausted,
    /// The sentinel is not on screen.
    NotVisible,
    /// A refetch started while this request was running; its result was dropped.
    Superseded,
}

/// Result of asking for the next page.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A page was loaded and appended.
    Fetched { page: u64, posts: usize },
    /// No request was sent, or its result was dropped.
    Skipped(SkipReason),
    /// The request failed. Loaded pages are kept.
    Failed(Arc<AppError>),
}

#[derive(Debug, Default)]
struct State {
    pages: Vec<FeedPage>,
    in_flight: bool,
    error: Option<Arc<AppError>>,
    epoch: u64,
}

impl State {
    fn has_next_page(&self) -> bool {
        self.pages.last().is_none_or(|p| p.has_next_page)
    }
}

/// Pages loaded so far for one filter.
///
/// Clones share state, so a clone can be handed to the scroll observer.
#[derive(Clone)]
pub struct InfiniteFeed {
    service: FeedService,
    filter: FeedFilter,
    state: Arc<Mutex<State>>,
}

impl InfiniteFeed {
    /// Create an empty feed. Nothing is fetched until asked.
    #[must_use]
    pub fn new(service: FeedService, filter: FeedFilter) -> Self {
        Self {
            service,
            filter: filter.normalized(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Request the page after the last loaded one.
    pub async fn fetch_next_page(&self) -> FetchOutcome {
        let (page, epoch) = {
            let mut state = self.state.lock().await;
            if state.in_flight {
                return FetchOutcome::Skipped(SkipReason::InFlight);
            }
            if !state.has_next_page() {
                return FetchOutcome::Skipped(SkipReason::Exhausted);
            }
            state.in_flight = true;
            (state.pages.len() as u64, state.epoch)
        };

        debug!(page, "Fetching feed page");
        let result = self.service.fetch_page(&self.filter, page).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!(page, "Dropping page fetched before refetch");
            return FetchOutcome::Skipped(SkipReason::Superseded);
        }
        state.in_flight = false;

        match result {
            Ok(loaded) => {
                let posts = loaded.posts.len();
                state.pages.push(loaded);
                state.error = None;
                FetchOutcome::Fetched { page, posts }
            }
            Err(e) => {
                warn!(page, error = %e, "Failed to fetch feed page");
                let e = Arc::new(e);
                state.error = Some(Arc::clone(&e));
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Scroll observer hook: the end-of-list sentinel became visible or hidden.
    pub async fn on_sentinel_visible(&self, visible: bool) -> FetchOutcome {
        if !visible {
            return FetchOutcome::Skipped(SkipReason::NotVisible);
        }
        self.fetch_next_page().await
    }

    /// Reload every page loaded so far, starting from the first.
    ///
    /// At least one page is loaded, and reloading stops early once a short
    /// page shows the feed has shrunk. A request already in flight keeps
    /// running but its result is discarded. Returns the outcome of the last
    /// request sent.
    pub async fn refetch(&self) -> FetchOutcome {
        let target = {
            let mut state = self.state.lock().await;
            let target = state.pages.len().max(1);
            state.epoch += 1;
            state.pages.clear();
            state.in_flight = false;
            state.error = None;
            target
        };
        debug!(pages = target, "Refetching feed");

        let mut last = self.fetch_next_page().await;
        for _ in 1..target {
            if !matches!(last, FetchOutcome::Fetched { .. }) {
                break;
            }
            match self.fetch_next_page().await {
                FetchOutcome::Skipped(SkipReason::Exhausted) => break,
                outcome => last = outcome,
            }
        }
        last
    }

    /// Every loaded post, in page order.
    pub async fn posts(&self) -> Vec<FeedPostView> {
        let state = self.state.lock().await;
        state
            .pages
            .iter()
            .flat_map(|p| p.posts.iter().cloned())
            .collect()
    }

    /// Whether another page may exist.
    pub async fn has_next_page(&self) -> bool {
        self.state.lock().await.has_next_page()
    }

    /// Whether a request is running.
    pub async fn is_fetching(&self) -> bool {
        self.state.lock().await.in_flight
    }

    /// Error from the last request, cleared by the next success.
    pub async fn error(&self) -> Option<Arc<AppError>> {
        self.state.lock().await.error.clone()
    }

    /// Number of pages loaded.
    pub async fn pages_loaded(&self) -> usize {
        self.state.lock().await.pages.len()
    }
}
