//! Redis Pub/Sub change feed.
//!
//! Every instance publishes its writes to `{prefix}:changes:{table}` and
//! subscribes to the same channels, so a write on one instance invalidates
//! the feed caches of all of them.

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::Error as RedisError;
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use fun_common::{AppError, AppResult};
use fun_core::{ChangeEvent, ChangeFeed, ChangePublisher, ChangeTable, LocalChangeFeed};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Channel carrying changes for `table`.
#[must_use]
pub fn channel_for(prefix: &str, table: ChangeTable) -> String {
    format!("{prefix}:changes:{table}")
}

fn redis_error(e: RedisError) -> AppError {
    AppError::Redis(e.to_string())
}

/// Change feed backed by Redis Pub/Sub.
#[derive(Clone)]
pub struct RedisChangeFeed {
    publisher: Client,
    subscriber: SubscriberClient,
    prefix: String,
    /// Events received from Redis, fanned out to local subscribers.
    local: LocalChangeFeed,
}

impl RedisChangeFeed {
    /// Connect the publishing and subscribing clients.
    pub async fn connect(redis_url: &str, prefix: &str) -> AppResult<Self> {
        let config = RedisConfig::from_url(redis_url).map_err(redis_error)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await.map_err(redis_error)?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await.map_err(redis_error)?;

        info!(prefix, "Redis change feed connected");

        Ok(Self {
            publisher,
            subscriber,
            prefix: prefix.to_string(),
            local: LocalChangeFeed::new(),
        })
    }

    /// Subscribe to every table channel and start forwarding received events.
    pub async fn start(&self) -> AppResult<()> {
        for table in ChangeTable::ALL {
            let channel = channel_for(&self.prefix, table);
            self.subscriber
                .subscribe(channel.as_str())
                .await
                .map_err(redis_error)?;
            debug!(channel = %channel, "Subscribed to change channel");
        }

        let local = self.local.clone();
        let mut messages = self.subscriber.message_rx();

        tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(message) => {
                        let Some(payload) = message.value.as_string() else {
                            continue;
                        };
                        match decode(&payload) {
                            Some(event) => local.send(event),
                            None => warn!(channel = &*message.channel, "Ignoring malformed change event"),
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Redis change stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            info!("Redis change stream ended");
        });

        Ok(())
    }

    /// Channel prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Close both clients.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.subscriber.quit().await.map_err(redis_error)?;
        self.publisher.quit().await.map_err(redis_error)?;
        info!("Redis change feed shut down");
        Ok(())
    }
}

fn decode(payload: &str) -> Option<ChangeEvent> {
    serde_json::from_str(payload).ok()
}

#[async_trait]
impl ChangePublisher for RedisChangeFeed {
    async fn publish(&self, event: &ChangeEvent) -> AppResult<()> {
        let channel = channel_for(&self.prefix, event.table);
        let payload = serde_json::to_string(event)
            .map_err(|e| AppError::Internal(format!("Failed to encode change event: {e}")))?;

        let _: () = self
            .publisher
            .publish(channel.as_str(), payload)
            .await
            .map_err(redis_error)?;
        debug!(channel = %channel, record_id = %event.record_id, "Published change event");
        Ok(())
    }
}

impl ChangeFeed for RedisChangeFeed {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.local.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fun_core::ChangeKind;

    #[test]
    fn test_channel_names() {
        assert_eq!(channel_for("fun", ChangeTable::FeedPosts), "fun:changes:feed_posts");
        assert_eq!(
            channel_for("staging", ChangeTable::FeedReactions),
            "staging:changes:feed_reactions"
        );
    }

    #[test]
    fn test_decode_published_payload() {
        let event = ChangeEvent::comment(ChangeKind::Delete, "c1", "p1");
        let payload = serde_json::to_string(&event).unwrap();

        assert!(payload.contains("\"table\":\"feed_comments\""));
        assert_eq!(decode(&payload), Some(event));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode("not json"), None);
        assert_eq!(decode(r#"{"table":"users","kind":"insert","record_id":"1"}"#), None);
    }
}
