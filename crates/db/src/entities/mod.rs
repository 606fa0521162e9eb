//! Database entities.

#![allow(missing_docs)]

pub mod feed_comment;
pub mod feed_post;
pub mod feed_reaction;
pub mod profile;

pub use feed_comment::Entity as FeedComment;
pub use feed_post::Entity as FeedPost;
pub use feed_reaction::Entity as FeedReaction;
pub use profile::Entity as Profile;
