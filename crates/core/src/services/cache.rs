//! Feed query result cache.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fun_db::FeedFilter;
use tokio::sync::RwLock;
use tracing::debug;

use super::feed::FeedPage;

/// Default upper bound on cached results.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Which read produced a cached result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedMode {
    /// The bounded list.
    Bounded,
    /// One page of the infinite feed.
    Page(u64),
}

/// Cache key: filter, read mode and viewer.
///
/// The viewer is part of the key because results carry the viewer's own
/// reaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedCacheKey {
    pub filter: FeedFilter,
    pub mode: FeedMode,
    pub viewer: Option<String>,
}

/// Marks cached feed reads stale.
///
/// Realtime synchronization only talks to this trait, so a more selective
/// strategy can replace the coarse default without touching callers.
#[async_trait]
pub trait FeedInvalidator: Send + Sync {
    /// Drop every cached feed result.
    async fn invalidate_feed(&self);

    /// Drop cached results that may contain `post_id`.
    ///
    /// Defaults to invalidating everything.
    async fn invalidate_post(&self, post_id: &str) {
        debug!(post_id = %post_id, "Invalidating whole feed for post change");
        self.invalidate_feed().await;
    }
}

/// Generation-stamped cache of feed query results.
///
/// Every invalidation bumps the generation. A fetch records the generation
/// before it starts and its result is only stored if no invalidation happened
/// in between, so a slow fetch never repopulates the cache with data older
/// than the last invalidation.
///
/// The number of results is capped; storing past the cap evicts the oldest
/// stored result first.
#[derive(Debug)]
pub struct FeedCache {
    entries: RwLock<Entries>,
    generation: AtomicU64,
    max_entries: usize,
}

#[derive(Debug, Default)]
struct Entries {
    pages: HashMap<FeedCacheKey, FeedPage>,
    order: VecDeque<FeedCacheKey>,
}

impl Entries {
    fn clear(&mut self) {
        self.pages.clear();
        self.order.clear();
    }
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl FeedCache {
    /// Create an empty cache holding up to [`DEFAULT_MAX_ENTRIES`] results.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache holding up to `max_entries` results.
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            generation: AtomicU64::new(0),
            max_entries: max_entries.max(1),
        }
    }

    /// Current generation. Read it before starting a fetch.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cached result for `key`.
    pub async fn get(&self, key: &FeedCacheKey) -> Option<FeedPage> {
        self.entries.read().await.pages.get(key).cloned()
    }

    /// Store a fetched result. Returns `false` if the cache was invalidated
    /// since `generation` was read and the result was discarded.
    pub async fn store(&self, key: FeedCacheKey, page: FeedPage, generation: u64) -> bool {
        let mut entries = self.entries.write().await;
        if self.generation() != generation {
            debug!("Discarding feed result fetched before invalidation");
            return false;
        }
        if entries.pages.contains_key(&key) {
            entries.pages.insert(key, page);
            return true;
        }
        while entries.pages.len() >= self.max_entries {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.pages.remove(&oldest);
            debug!(?oldest, "Evicted feed cache entry");
        }
        entries.order.push_back(key.clone());
        entries.pages.insert(key, page);
        true
    }

    /// Number of cached results.
    pub async fn len(&self) -> usize {
        self.entries.read().await.pages.len()
    }

    /// Whether nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.pages.is_empty()
    }
}

#[async_trait]
impl FeedInvalidator for FeedCache {
    async fn invalidate_feed(&self) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let dropped = entries.pages.len();
        entries.clear();
        debug!(dropped, generation = self.generation(), "Feed cache invalidated");
    }
}
