//! Store ports consumed by the feed and mutation services.
//!
//! Each port is implemented by a sea-orm repository in [`crate::repositories`]
//! and, for tests, by [`crate::test_utils::InMemoryGateway`].

use std::collections::HashMap;

use async_trait::async_trait;
use fun_common::AppResult;
use serde::{Deserialize, Serialize};

use crate::entities::{feed_comment, feed_post, feed_reaction, profile};

/// Filter applied to feed reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedFilter {
    /// Exact post type.
    #[serde(default)]
    pub post_type: Option<feed_post::PostType>,
    /// Exact category.
    #[serde(default)]
    pub category: Option<String>,
    /// Case-insensitive substring of the location label.
    #[serde(default)]
    pub location: Option<String>,
    /// Case-insensitive substring of title or content.
    #[serde(default)]
    pub search: Option<String>,
}

impl FeedFilter {
    /// Drop blank text criteria so that `?search=` behaves like no search.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn non_blank(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            post_type: self.post_type,
            category: non_blank(self.category),
            location: non_blank(self.location),
            search: non_blank(self.search),
        }
    }

    /// Evaluate the filter against a post in memory.
    ///
    /// Mirrors the SQL built by the post repository; visibility is not part of
    /// the filter and is checked separately.
    #[must_use]
    pub fn matches(&self, post: &feed_post::Model) -> bool {
        fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
            haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        }

        if let Some(post_type) = self.post_type
            && post.post_type != post_type
        {
            return false;
        }

        if let Some(category) = &self.category
            && post.category.as_deref() != Some(category.as_str())
        {
            return false;
        }

        if let Some(location) = &self.location
            && !contains_ci(post.location.as_deref(), location)
        {
            return false;
        }

        if let Some(search) = &self.search
            && !contains_ci(post.title.as_deref(), search)
            && !contains_ci(post.content.as_deref(), search)
        {
            return false;
        }

        true
    }
}

/// Read and write access to feed posts.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Approved, active posts matching `filter`, newest first.
    async fn find_visible(
        &self,
        filter: &FeedFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<feed_post::Model>>;

    /// Find a post by ID regardless of visibility.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<feed_post::Model>>;

    /// Persist a new post.
    async fn insert(&self, post: feed_post::Model) -> AppResult<feed_post::Model>;

    /// Overwrite an existing post.
    async fn update(&self, post: feed_post::Model) -> AppResult<feed_post::Model>;

    /// Hard delete a post.
    async fn delete(&self, id: &str) -> AppResult<()>;
}

/// Access to reactions, at most one per (post, user).
#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Delete every reaction of `user_id` on `post_id`. Returns the number of rows removed.
    async fn delete_by_post_and_user(&self, post_id: &str, user_id: &str) -> AppResult<u64>;

    /// Insert a reaction. A second row for the same (post, user) yields `AppError::Conflict`.
    async fn insert(&self, reaction: feed_reaction::Model) -> AppResult<feed_reaction::Model>;

    /// Find the reaction of a user on a post.
    async fn find_by_post_and_user(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> AppResult<Option<feed_reaction::Model>>;

    /// Reaction totals keyed by post ID. Posts without reactions are absent.
    async fn count_by_posts(&self, post_ids: &[String]) -> AppResult<HashMap<String, u64>>;

    /// The reactions a single user left on any of the given posts.
    async fn find_by_posts_and_user(
        &self,
        post_ids: &[String],
        user_id: &str,
    ) -> AppResult<Vec<feed_reaction::Model>>;
}

/// Access to comments.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persist a new comment.
    async fn insert(&self, comment: feed_comment::Model) -> AppResult<feed_comment::Model>;

    /// Find a comment by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<feed_comment::Model>>;

    /// Delete a comment.
    async fn delete(&self, id: &str) -> AppResult<()>;

    /// All comments on a post, oldest first.
    async fn find_by_post(&self, post_id: &str) -> AppResult<Vec<feed_comment::Model>>;

    /// Comment totals keyed by post ID. Posts without comments are absent.
    async fn count_by_posts(&self, post_ids: &[String]) -> AppResult<HashMap<String, u64>>;
}

/// Read access to public profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profiles for the given user IDs. Unknown IDs are skipped.
    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<profile::Model>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::feed_post::{ModerationStatus, PostType};
    use chrono::Utc;

    fn post(title: Option<&str>, content: Option<&str>) -> feed_post::Model {
        let now = Utc::now().into();
        feed_post::Model {
            id: "p1".to_string(),
            user_id: "u1".to_string(),
            post_type: PostType::Need,
            title: title.map(str::to_string),
            content: content.map(str::to_string),
            media_urls: serde_json::json!([]),
            category: Some("food".to_string()),
            location: Some("Quận 1, TP.HCM".to_string()),
            region_code: None,
            latitude: None,
            longitude: None,
            campaign_id: None,
            target_amount: None,
            fulfilled_amount: 0,
            beneficiaries_count: None,
            urgency: None,
            is_matched: false,
            matched_post_id: None,
            moderation_status: ModerationStatus::Approved,
            is_active: true,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(FeedFilter::default().matches(&post(None, None)));
    }

    #[test]
    fn test_post_type_filter() {
        let filter = FeedFilter {
            post_type: Some(PostType::Supply),
            ..Default::default()
        };
        assert!(!filter.matches(&post(None, None)));
    }

    #[test]
    fn test_search_is_case_insensitive_over_title_or_content() {
        let filter = FeedFilter {
            search: Some("GẠO".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&post(Some("Cần gạo"), None)));
        assert!(filter.matches(&post(None, Some("xin 10kg gạo"))));
        assert!(!filter.matches(&post(Some("Cần sữa"), Some("cho bé"))));
    }

    #[test]
    fn test_location_substring() {
        let filter = FeedFilter {
            location: Some("tp.hcm".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&post(None, None)));
    }

    #[test]
    fn test_normalized_drops_blank_criteria() {
        let filter = FeedFilter {
            search: Some("   ".to_string()),
            category: Some(" food ".to_string()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(filter.search, None);
        assert_eq!(filter.category.as_deref(), Some("food"));
    }
}
