//! Feed query service.
//!
//! Two read modes over visible posts (active and approved):
//!
//! - a bounded list of up to [`BOUNDED_PAGE_SIZE`] posts
//! - numbered pages of [`INFINITE_PAGE_SIZE`] posts for infinite scrolling
//!
//! Each page is enriched with author, reaction count, comment count and the
//! viewer's own reaction using one batched lookup per joined entity.
//! Enrichment reads are separate queries, so counts may be slightly newer
//! than the post rows they are attached to.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset};
use fun_common::{AppError, AppResult};
use fun_db::FeedFilter;
use fun_db::entities::{feed_post, profile};
use serde::Serialize;
use tracing::debug;

use super::cache::{FeedCacheKey, FeedMode};
use super::gateway::DataGateway;
use super::media::{MediaReference, normalize_media};
use super::session::SessionContext;

/// Maximum number of posts returned by the bounded read.
pub const BOUNDED_PAGE_SIZE: u64 = 50;

/// Posts per page of the infinite feed.
pub const INFINITE_PAGE_SIZE: u64 = 10;

/// Author snippet shown on a feed card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorSnippet {
    pub id: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub reputation_score: i32,
}

impl From<profile::Model> for AuthorSnippet {
    fn from(p: profile::Model) -> Self {
        Self {
            id: p.id,
            full_name: p.full_name,
            avatar_url: p.avatar_url,
            is_verified: p.is_verified,
            reputation_score: p.reputation_score,
        }
    }
}

/// A post as shown in the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPostView {
    pub id: String,
    pub user_id: String,
    pub post_type: feed_post::PostType,
    pub title: Option<String>,
    pub content: Option<String>,
    pub media: Vec<MediaReference>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub region_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub campaign_id: Option<String>,
    pub target_amount: Option<i64>,
    pub fulfilled_amount: i64,
    pub beneficiaries_count: Option<i32>,
    pub urgency: Option<feed_post::Urgency>,
    pub is_matched: bool,
    pub matched_post_id: Option<String>,
    pub expires_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub author: Option<AuthorSnippet>,
    pub reaction_count: u64,
    pub comment_count: u64,
    pub viewer_reaction: Option<String>,
}

impl FeedPostView {
    /// Build the view for a row, without enrichment.
    ///
    /// Economic fields are cleared for post types where they carry no meaning.
    #[must_use]
    pub fn from_model(post: feed_post::Model) -> Self {
        let media = normalize_media(&post.media_urls);
        let economic = post.post_type.has_economics();

        Self {
            id: post.id,
            user_id: post.user_id,
            post_type: post.post_type,
            title: post.title,
            content: post.content,
            media,
            category: post.category,
            location: post.location,
            region_code: post.region_code,
            latitude: post.latitude,
            longitude: post.longitude,
            campaign_id: post.campaign_id,
            target_amount: post.target_amount.filter(|_| economic),
            fulfilled_amount: if economic { post.fulfilled_amount } else { 0 },
            beneficiaries_count: post.beneficiaries_count.filter(|_| economic),
            urgency: post.urgency.filter(|_| economic),
            is_matched: post.is_matched,
            matched_post_id: post.matched_post_id,
            expires_at: post.expires_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
            author: None,
            reaction_count: 0,
            comment_count: 0,
            viewer_reaction: None,
        }
    }
}

/// One page of the infinite feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    pub posts: Vec<FeedPostView>,
    /// Zero-based page index.
    pub page: u64,
    /// True iff this page is full-sized.
    pub has_next_page: bool,
}

/// Feed query service.
#[derive(Clone)]
pub struct FeedService {
    gateway: DataGateway,
    session: SessionContext,
}

impl FeedService {
    /// Create a feed service for a session.
    #[must_use]
    pub const fn new(gateway: DataGateway, session: SessionContext) -> Self {
        Self { gateway, session }
    }

    /// The session this service reads for.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Up to [`BOUNDED_PAGE_SIZE`] visible posts, newest first.
    pub async fn fetch_bounded(&self, filter: &FeedFilter) -> AppResult<Vec<FeedPostView>> {
        let page = self
            .cached_read(filter, FeedMode::Bounded, BOUNDED_PAGE_SIZE, 0)
            .await?;
        Ok(page.posts)
    }

    /// Page `page` (zero-based) of the infinite feed.
    ///
    /// The row offset must fit a signed 64-bit SQL `OFFSET`.
    pub async fn fetch_page(&self, filter: &FeedFilter, page: u64) -> AppResult<FeedPage> {
        let offset = page
            .checked_mul(INFINITE_PAGE_SIZE)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| AppError::BadRequest(format!("Page index out of range: {page}")))?;
        self.cached_read(filter, FeedMode::Page(page), INFINITE_PAGE_SIZE, offset)
            .await
    }

    /// A single visible post.
    pub async fn get_post(&self, post_id: &str) -> AppResult<FeedPostView> {
        let post = self
            .gateway
            .posts
            .find_by_id(post_id)
            .await?
            .filter(feed_post::Model::is_visible)
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))?;

        self.enrich(vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))
    }

    async fn cached_read(
        &self,
        filter: &FeedFilter,
        mode: FeedMode,
        limit: u64,
        offset: u64,
    ) -> AppResult<FeedPage> {
        let key = FeedCacheKey {
            filter: filter.clone(),
            mode,
            viewer: self.session.user_id().map(str::to_string),
        };

        if let Some(hit) = self.gateway.cache.get(&key).await {
            debug!(?mode, "Feed cache hit");
            return Ok(hit);
        }

        let generation = self.gateway.cache.generation();
        let rows = self.gateway.posts.find_visible(filter, limit, offset).await?;
        let has_next_page = matches!(mode, FeedMode::Page(_)) && rows.len() as u64 == limit;
        let posts = self.enrich(rows).await?;

        let page = FeedPage {
            posts,
            page: match mode {
                FeedMode::Bounded => 0,
                FeedMode::Page(n) => n,
            },
            has_next_page,
        };

        debug!(?mode, count = page.posts.len(), has_next_page, "Fetched feed");
        self.gateway.cache.store(key, page.clone(), generation).await;
        Ok(page)
    }

    /// Attach author, counts and viewer reaction with one lookup per entity.
    ///
    /// Duplicate rows are collapsed, keeping the first occurrence.
    async fn enrich(&self, rows: Vec<feed_post::Model>) -> AppResult<Vec<FeedPostView>> {
        let mut seen = HashSet::new();
        let rows: Vec<_> = rows.into_iter().filter(|p| seen.insert(p.id.clone())).collect();
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<String> = rows.iter().map(|p| p.id.clone()).collect();
        let mut author_ids: Vec<String> = rows.iter().map(|p| p.user_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let viewer_reactions = async {
            match self.session.user_id() {
                Some(user_id) => {
                    self.gateway
                        .reactions
                        .find_by_posts_and_user(&post_ids, user_id)
                        .await
                }
                None => Ok(Vec::new()),
            }
        };

        let (profiles, reaction_counts, comment_counts, viewer_reactions) = tokio::try_join!(
            self.gateway.profiles.find_by_ids(&author_ids),
            self.gateway.reactions.count_by_posts(&post_ids),
            self.gateway.comments.count_by_posts(&post_ids),
            viewer_reactions,
        )?;

        let authors: HashMap<String, AuthorSnippet> = profiles
            .into_iter()
            .map(|p| (p.id.clone(), AuthorSnippet::from(p)))
            .collect();
        let viewer_reactions: HashMap<String, String> = viewer_reactions
            .into_iter()
            .map(|r| (r.post_id, r.reaction_type))
            .collect();

        Ok(rows
            .into_iter()
            .map(|post| {
                let mut view = FeedPostView::from_model(post);
                view.author = authors.get(&view.user_id).cloned();
                view.reaction_count = reaction_counts.get(&view.id).copied().unwrap_or(0);
                view.comment_count = comment_counts.get(&view.id).copied().unwrap_or(0);
                view.viewer_reaction = viewer_reactions.get(&view.id).cloned();
                view
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::cache::FeedInvalidator;
    use crate::services::test_support::{approved_post, gateway_with_memory, profile, reaction};
    use fun_db::entities::feed_post::{ModerationStatus, PostType};

    #[tokio::test]
    async fn test_visibility_invariant() {
        let (gateway, memory, _dir) = gateway_with_memory();
        memory.seed_post(approved_post("visible", PostType::Story, 1)).await;

        let mut pending = approved_post("pending", PostType::Story, 2);
        pending.moderation_status = ModerationStatus::Pending;
        memory.seed_post(pending).await;

        let mut rejected = approved_post("rejected", PostType::Story, 3);
        rejected.moderation_status = ModerationStatus::Rejected;
        memory.seed_post(rejected).await;

        let mut inactive = approved_post("inactive", PostType::Story, 4);
        inactive.is_active = false;
        memory.seed_post(inactive).await;

        let service = FeedService::new(gateway, SessionContext::anonymous());

        let bounded = service.fetch_bounded(&FeedFilter::default()).await.unwrap();
        let ids: Vec<_> = bounded.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["visible"]);

        let page = service.fetch_page(&FeedFilter::default(), 0).await.unwrap();
        assert_eq!(page.posts.len(), 1);

        assert!(matches!(
            service.get_post("pending").await,
            Err(AppError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bounded_fetch_caps_at_fifty_newest_first() {
        let (gateway, memory, _dir) = gateway_with_memory();
        for i in 0..60 {
            memory
                .seed_post(approved_post(&format!("p{i:02}"), PostType::Update, i))
                .await;
        }

        let service = FeedService::new(gateway, SessionContext::anonymous());
        let posts = service.fetch_bounded(&FeedFilter::default()).await.unwrap();

        assert_eq!(posts.len(), 50);
        assert!(posts.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(posts[0].id, "p00");
    }

    #[tokio::test]
    async fn test_filter_by_post_type() {
        let (gateway, memory, _dir) = gateway_with_memory();
        memory.seed_post(approved_post("n1", PostType::Need, 1)).await;
        memory.seed_post(approved_post("s1", PostType::Supply, 2)).await;
        memory.seed_post(approved_post("n2", PostType::Need, 3)).await;

        let service = FeedService::new(gateway, SessionContext::anonymous());
        let filter = FeedFilter {
            post_type: Some(PostType::Need),
            ..Default::default()
        };
        let posts = service.fetch_bounded(&filter).await.unwrap();

        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|p| p.post_type == PostType::Need));
    }

    #[tokio::test]
    async fn test_page_has_next_iff_full() {
        let (gateway, memory, _dir) = gateway_with_memory();
        for i in 0..15 {
            memory
                .seed_post(approved_post(&format!("p{i:02}"), PostType::Story, i))
                .await;
        }

        let service = FeedService::new(gateway, SessionContext::anonymous());
        let first = service.fetch_page(&FeedFilter::default(), 0).await.unwrap();
        let second = service.fetch_page(&FeedFilter::default(), 1).await.unwrap();

        assert_eq!(first.posts.len(), 10);
        assert!(first.has_next_page);
        assert_eq!(second.posts.len(), 5);
        assert!(!second.has_next_page);
        assert_eq!(second.posts[0].id, "p10");
    }

    #[tokio::test]
    async fn test_page_offset_must_fit_sql_offset() {
        let (gateway, memory, _dir) = gateway_with_memory();
        memory
            .seed_post(approved_post("p1", PostType::Need, 1))
            .await;
        let service = FeedService::new(gateway, SessionContext::anonymous());
        let filter = FeedFilter::default();

        let last_ok = i64::MAX as u64 / INFINITE_PAGE_SIZE;
        let page = service.fetch_page(&filter, last_ok).await.unwrap();
        assert!(page.posts.is_empty());

        for page in [last_ok + 1, u64::MAX / INFINITE_PAGE_SIZE + 1, u64::MAX] {
            assert!(matches!(
                service.fetch_page(&filter, page).await,
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_enrichment() {
        let (gateway, memory, _dir) = gateway_with_memory();
        memory.seed_profile(profile("author1")).await;
        memory.seed_post(approved_post("p1", PostType::Need, 1)).await;

        use fun_db::ReactionStore;
        memory.insert(reaction("r1", "p1", "viewer", "love")).await.unwrap();
        memory.insert(reaction("r2", "p1", "other", "like")).await.unwrap();

        let service = FeedService::new(
            gateway,
            SessionContext::authenticated("viewer", None),
        );
        let post = service.get_post("p1").await.unwrap();

        assert_eq!(post.author.unwrap().full_name.as_deref(), Some("Người dùng author1"));
        assert_eq!(post.reaction_count, 2);
        assert_eq!(post.comment_count, 0);
        assert_eq!(post.viewer_reaction.as_deref(), Some("love"));
    }

    #[tokio::test]
    async fn test_economic_fields_cleared_for_stories() {
        let mut story = approved_post("s1", PostType::Story, 1);
        story.target_amount = Some(1_000);
        story.fulfilled_amount = 500;
        story.urgency = Some(feed_post::Urgency::Critical);

        let view = FeedPostView::from_model(story);

        assert_eq!(view.target_amount, None);
        assert_eq!(view.fulfilled_amount, 0);
        assert_eq!(view.urgency, None);
    }

    #[tokio::test]
    async fn test_reads_are_cached_until_invalidated() {
        let (gateway, memory, _dir) = gateway_with_memory();
        memory.seed_post(approved_post("p1", PostType::Story, 1)).await;

        let service = FeedService::new(gateway.clone(), SessionContext::anonymous());
        assert_eq!(service.fetch_bounded(&FeedFilter::default()).await.unwrap().len(), 1);

        memory.seed_post(approved_post("p2", PostType::Story, 0)).await;
        assert_eq!(service.fetch_bounded(&FeedFilter::default()).await.unwrap().len(), 1);

        gateway.cache.invalidate_feed().await;
        assert_eq!(service.fetch_bounded(&FeedFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_read_fails_whole_page() {
        let (gateway, memory, _dir) = gateway_with_memory();
        memory.seed_post(approved_post("p1", PostType::Story, 1)).await;
        memory.set_fail_reads(true);

        let service = FeedService::new(gateway, SessionContext::anonymous());
        let err = service
            .fetch_page(&FeedFilter::default(), 0)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
