//! Row change notifications.
//!
//! Services publish a [`ChangeEvent`] after every successful write. The
//! in-process [`LocalChangeFeed`] fans them out on a tokio broadcast channel;
//! the realtime crate provides a Redis-backed implementation for deployments
//! with more than one instance.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use fun_common::AppResult;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Tables that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    FeedPosts,
    FeedReactions,
    FeedComments,
}

impl ChangeTable {
    /// Every table feed views depend on.
    pub const ALL: [Self; 3] = [Self::FeedPosts, Self::FeedReactions, Self::FeedComments];

    /// Table name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FeedPosts => "feed_posts",
            Self::FeedReactions => "feed_reactions",
            Self::FeedComments => "feed_comments",
        }
    }

    /// Parse a table name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for ChangeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub kind: ChangeKind,
    /// Primary key of the changed row.
    pub record_id: String,
    /// Post the row belongs to (the row itself for `feed_posts`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

impl ChangeEvent {
    /// Change on a post row.
    #[must_use]
    pub fn post(kind: ChangeKind, post_id: &str) -> Self {
        Self {
            table: ChangeTable::FeedPosts,
            kind,
            record_id: post_id.to_string(),
            post_id: Some(post_id.to_string()),
        }
    }

    /// Change on a reaction row.
    #[must_use]
    pub fn reaction(kind: ChangeKind, reaction_id: &str, post_id: &str) -> Self {
        Self {
            table: ChangeTable::FeedReactions,
            kind,
            record_id: reaction_id.to_string(),
            post_id: Some(post_id.to_string()),
        }
    }

    /// Change on a comment row.
    #[must_use]
    pub fn comment(kind: ChangeKind, comment_id: &str, post_id: &str) -> Self {
        Self {
            table: ChangeTable::FeedComments,
            kind,
            record_id: comment_id.to_string(),
            post_id: Some(post_id.to_string()),
        }
    }
}

/// Publishes change events.
///
/// Lets the mutation services announce writes without depending on the
/// transport.
#[async_trait]
pub trait ChangePublisher: Send + Sync {
    /// Publish one change.
    async fn publish(&self, event: &ChangeEvent) -> AppResult<()>;
}

/// Source of change events.
pub trait ChangeFeed: Send + Sync {
    /// Receive every change published after this call.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Wrapper for boxed `ChangePublisher` trait object.
pub type ChangePublisherService = Arc<dyn ChangePublisher>;

/// A no-op publisher for tests or when realtime updates are disabled.
#[derive(Clone, Default)]
pub struct NoOpChangePublisher;

#[async_trait]
impl ChangePublisher for NoOpChangePublisher {
    async fn publish(&self, _event: &ChangeEvent) -> AppResult<()> {
        Ok(())
    }
}

/// In-process change feed on a tokio broadcast channel.
#[derive(Clone)]
pub struct LocalChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl LocalChangeFeed {
    /// Default channel capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create a feed with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a feed with a custom capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Deliver an event to local subscribers.
    ///
    /// Having no subscribers is not an error.
    pub fn send(&self, event: ChangeEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        debug!(receivers, "Delivered change event");
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangePublisher for LocalChangeFeed {
    async fn publish(&self, event: &ChangeEvent) -> AppResult<()> {
        self.send(event.clone());
        Ok(())
    }
}

impl ChangeFeed for LocalChangeFeed {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}
