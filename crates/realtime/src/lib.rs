//! Cross-instance change distribution for FUN Charity.
//!
//! [`RedisChangeFeed`] publishes row change events on Redis Pub/Sub, one
//! channel per table, and fans received events out to local subscribers.
//! Single-instance deployments use `fun_core::LocalChangeFeed` instead.

pub mod pubsub;

pub use pubsub::{RedisChangeFeed, channel_for};
