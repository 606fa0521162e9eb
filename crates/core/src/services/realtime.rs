//! Realtime synchronization.
//!
//! Listens to row changes on the feed tables and marks cached feed reads
//! stale. Invalidation is coarse: any change to any watched table drops the
//! whole feed cache.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cache::FeedInvalidator;
use super::change::{ChangeFeed, ChangeTable};

/// Listener for one table. The listener stops when this is dropped.
#[derive(Debug)]
pub struct Subscription {
    table: ChangeTable,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Table this subscription listens to.
    #[must_use]
    pub const fn table(&self) -> ChangeTable {
        self.table
    }

    /// Whether the listener task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
        debug!(table = %self.table, "Realtime subscription closed");
    }
}

/// Keeps the feed cache in step with changes on the feed tables.
pub struct RealtimeSync {
    subscriptions: Vec<Subscription>,
}

impl RealtimeSync {
    /// Open one subscription per table.
    ///
    /// Duplicate tables are ignored. Must be called from within a tokio
    /// runtime.
    pub fn start(
        feed: &dyn ChangeFeed,
        invalidator: Arc<dyn FeedInvalidator>,
        tables: &[ChangeTable],
    ) -> Self {
        let mut subscriptions: Vec<Subscription> = Vec::with_capacity(tables.len());

        for &table in tables {
            if subscriptions.iter().any(|s| s.table == table) {
                continue;
            }

            let mut receiver = feed.subscribe();
            let invalidator = invalidator.clone();
            let handle = tokio::spawn(async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) if event.table == table => {
                            debug!(table = %table, record_id = %event.record_id, "Change received");
                            match &event.post_id {
                                Some(post_id) => invalidator.invalidate_post(post_id).await,
                                None => invalidator.invalidate_feed().await,
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(table = %table, skipped, "Realtime listener lagged");
                            invalidator.invalidate_feed().await;
                        }
                        Err(RecvError::Closed) => {
                            info!(table = %table, "Change feed closed");
                            break;
                        }
                    }
                }
            });

            subscriptions.push(Subscription { table, handle });
        }

        info!(tables = subscriptions.len(), "Realtime sync started");
        Self { subscriptions }
    }

    /// Tables with an open subscription.
    #[must_use]
    pub fn tables(&self) -> Vec<ChangeTable> {
        self.subscriptions.iter().map(Subscription::table).collect()
    }

    /// Close every subscription.
    pub fn close(&mut self) {
        let closed = self.subscriptions.len();
        self.subscriptions.clear();
        if closed > 0 {
            info!(closed, "Realtime sync stopped");
        }
    }
}

impl Drop for RealtimeSync {
    fn drop(&mut self) {
        self.close();
    }
}
