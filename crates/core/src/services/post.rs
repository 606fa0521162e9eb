//! Post service: creation behind the moderation gate, owner edits and deletes.

use chrono::Utc;
use fun_common::{AppError, AppResult, IdGenerator};
use fun_db::entities::feed_post::{self, ModerationStatus, PostType, Urgency};
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use super::change::{ChangeEvent, ChangeKind};
use super::gateway::DataGateway;
use super::media::{MediaReference, media_to_value, media_urls, normalize_media};
use super::moderation::ModerationOutcome;
use super::session::SessionContext;

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostInput {
    pub post_type: PostType,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 10000))]
    pub content: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub media: Vec<MediaReference>,
    #[validate(length(max = 64))]
    pub category: Option<String>,
    #[validate(length(max = 256))]
    pub location: Option<String>,
    #[validate(length(max = 16))]
    pub region_code: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    pub campaign_id: Option<String>,
    #[validate(range(min = 0))]
    pub target_amount: Option<i64>,
    #[validate(range(min = 0))]
    pub beneficiaries_count: Option<i32>,
    pub urgency: Option<Urgency>,
}

impl CreatePostInput {
    /// A post of `post_type` with just a text body.
    #[must_use]
    pub fn text(post_type: PostType, content: impl Into<String>) -> Self {
        Self {
            post_type,
            title: None,
            content: Some(content.into()),
            media: Vec::new(),
            category: None,
            location: None,
            region_code: None,
            latitude: None,
            longitude: None,
            campaign_id: None,
            target_amount: None,
            beneficiaries_count: None,
            urgency: None,
        }
    }
}

/// Input for editing a post. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePostInput {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 10000))]
    pub content: Option<String>,
    #[validate(length(max = 10))]
    pub media: Option<Vec<MediaReference>>,
}

/// Title and body joined the way moderation sees them.
fn moderation_text(title: Option<&str>, content: Option<&str>) -> String {
    [title, content]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Post mutation service.
#[derive(Clone)]
pub struct PostService {
    gateway: DataGateway,
    session: SessionContext,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a post service for a session.
    #[must_use]
    pub const fn new(gateway: DataGateway, session: SessionContext) -> Self {
        Self {
            gateway,
            session,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post.
    ///
    /// Attached uploads must come from the author's own storage folder. The
    /// text and media are then checked by the moderation gate. A
    /// rejection removes the already uploaded media and fails with the
    /// moderation reason. An unavailable moderation service does not block
    /// the post. New posts start as pending and only appear in the feed once
    /// approved.
    pub async fn create(&self, input: CreatePostInput) -> AppResult<feed_post::Model> {
        let user_id = self.session.require_user()?;
        input.validate()?;

        if !has_text(input.content.as_deref()) && input.media.is_empty() {
            return Err(AppError::Validation(
                "Post needs text content or at least one media attachment".to_string(),
            ));
        }

        let urls = media_urls(&input.media);
        self.ensure_own_media(user_id, &urls)?;
        let text = moderation_text(input.title.as_deref(), input.content.as_deref());
        self.moderate(user_id, &text, &urls, &urls).await?;

        let economic = input.post_type.has_economics();
        let now = Utc::now().into();
        let post = feed_post::Model {
            id: self.id_gen.generate(),
            user_id: user_id.to_string(),
            post_type: input.post_type,
            title: input.title.filter(|t| !t.trim().is_empty()),
            content: input.content.filter(|c| !c.trim().is_empty()),
            media_urls: media_to_value(&input.media),
            category: input.category,
            location: input.location,
            region_code: input.region_code,
            latitude: input.latitude,
            longitude: input.longitude,
            campaign_id: input.campaign_id,
            target_amount: input.target_amount.filter(|_| economic),
            fulfilled_amount: 0,
            beneficiaries_count: input.beneficiaries_count.filter(|_| economic),
            urgency: input.urgency.filter(|_| economic),
            is_matched: false,
            matched_post_id: None,
            moderation_status: ModerationStatus::Pending,
            is_active: true,
            expires_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.gateway.posts.insert(post).await?;
        info!(post_id = %created.id, user_id = %user_id, post_type = ?created.post_type, "Post created");

        self.gateway
            .announce(ChangeEvent::post(ChangeKind::Insert, &created.id))
            .await;

        Ok(created)
    }

    /// Edit the text or media of one of the caller's posts.
    ///
    /// Edits go through moderation as well; a rejection only removes media
    /// that the edit newly introduced. Media dropped by a successful edit is
    /// deleted from storage.
    pub async fn update(&self, post_id: &str, input: UpdatePostInput) -> AppResult<feed_post::Model> {
        let user_id = self.session.require_user()?;
        input.validate()?;

        let mut post = self.owned_post(post_id, user_id).await?;
        let old_media = normalize_media(&post.media_urls);

        if let Some(title) = input.title {
            post.title = Some(title).filter(|t| !t.trim().is_empty());
        }
        if let Some(content) = input.content {
            post.content = Some(content).filter(|c| !c.trim().is_empty());
        }
        let new_media = input.media.unwrap_or_else(|| old_media.clone());

        if !has_text(post.content.as_deref()) && new_media.is_empty() {
            return Err(AppError::Validation(
                "Post needs text content or at least one media attachment".to_string(),
            ));
        }

        let old_urls = media_urls(&old_media);
        let new_urls = media_urls(&new_media);
        let added: Vec<String> = new_urls
            .iter()
            .filter(|u| !old_urls.contains(u))
            .cloned()
            .collect();
        let dropped: Vec<String> = old_urls
            .iter()
            .filter(|u| !new_urls.contains(u))
            .cloned()
            .collect();

        self.ensure_own_media(user_id, &added)?;
        let text = moderation_text(post.title.as_deref(), post.content.as_deref());
        self.moderate(user_id, &text, &new_urls, &added).await?;

        post.media_urls = media_to_value(&new_media);
        post.updated_at = Utc::now().into();

        let updated = self.gateway.posts.update(post).await?;
        info!(post_id = %updated.id, "Post updated");

        self.remove_media(user_id, &dropped).await;
        self.gateway
            .announce(ChangeEvent::post(ChangeKind::Update, &updated.id))
            .await;

        Ok(updated)
    }

    /// Hard delete one of the caller's posts and its stored media.
    pub async fn delete(&self, post_id: &str) -> AppResult<()> {
        let user_id = self.session.require_user()?;
        let post = self.owned_post(post_id, user_id).await?;

        self.gateway.posts.delete(post_id).await?;
        info!(post_id = %post_id, "Post deleted");

        self.remove_media(user_id, &media_urls(&normalize_media(&post.media_urls)))
            .await;
        self.gateway
            .announce(ChangeEvent::post(ChangeKind::Delete, post_id))
            .await;

        Ok(())
    }

    async fn owned_post(&self, post_id: &str, user_id: &str) -> AppResult<feed_post::Model> {
        let post = self
            .gateway
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))?;

        if post.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can modify this post".to_string(),
            ));
        }
        Ok(post)
    }

    /// Storage keys under this prefix belong to `user_id`.
    fn owner_prefix(user_id: &str) -> String {
        format!("posts/{user_id}/")
    }

    /// Whether `url` is stored by our backend under someone else's folder.
    fn is_foreign_upload(&self, user_id: &str, url: &str) -> bool {
        let prefix = Self::owner_prefix(user_id);
        self.gateway
            .storage
            .key_from_url(url)
            .is_some_and(|key| !key.starts_with(&prefix))
    }

    /// Posts may only attach uploads from the author's own storage folder.
    fn ensure_own_media(&self, user_id: &str, urls: &[String]) -> AppResult<()> {
        if let Some(url) = urls.iter().find(|url| self.is_foreign_upload(user_id, url)) {
            return Err(AppError::Forbidden(format!(
                "Media does not belong to the author: {url}"
            )));
        }
        Ok(())
    }

    /// Run the moderation gate; on rejection remove `cleanup` from storage.
    async fn moderate(
        &self,
        user_id: &str,
        text: &str,
        urls: &[String],
        cleanup: &[String],
    ) -> AppResult<()> {
        let outcome = self
            .gateway
            .moderation()
            .check(text, urls, self.session.access_token())
            .await?;

        match outcome {
            ModerationOutcome::Approved | ModerationOutcome::Unavailable => Ok(()),
            ModerationOutcome::Rejected { reason } => {
                self.remove_media(user_id, cleanup).await;
                Err(AppError::ContentRejected { reason })
            }
        }
    }

    /// Delete the caller's own uploads among `urls`. Anything stored under
    /// another user's folder is left alone.
    async fn remove_media(&self, user_id: &str, urls: &[String]) {
        let (foreign, owned): (Vec<String>, Vec<String>) = urls
            .iter()
            .cloned()
            .partition(|url| self.is_foreign_upload(user_id, url));
        if !foreign.is_empty() {
            warn!(user_id = %user_id, skipped = foreign.len(), "Skipping media owned by another user");
        }
        if owned.is_empty() {
            return;
        }
        match self.gateway.storage.remove_urls(&owned).await {
            Ok(removed) => info!(removed, "Removed post media from storage"),
            Err(e) => warn!(error = %e, "Failed to remove post media"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::moderation::test_support::ScriptedInvoker;
    use crate::services::test_support::{MEDIA_BASE_URL, approved_post, gateway_with_memory};
    use fun_common::StorageBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn with_moderation(gateway: DataGateway, invoker: &Arc<ScriptedInvoker>) -> DataGateway {
        gateway.with_functions(invoker.clone(), "moderate-content")
    }

    async fn upload(gateway: &DataGateway, key: &str) -> String {
        gateway
            .storage
            .upload(key, b"fake image", "image/jpeg")
            .await
            .unwrap()
            .url
    }

    #[tokio::test]
    async fn test_requires_login() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let service = PostService::new(gateway, SessionContext::anonymous());

        let err = service
            .create(CreatePostInput::text(PostType::Story, "hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Unauthorized));
        assert!(memory.posts().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_post_is_rejected_before_moderation() {
        let (gateway, _memory, _dir) = gateway_with_memory();
        let invoker = Arc::new(ScriptedInvoker::replying(json!({"safe": true})));
        let service = PostService::new(
            with_moderation(gateway, &invoker),
            SessionContext::authenticated("user1", None),
        );

        let err = service
            .create(CreatePostInput::text(PostType::Story, "   "))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_story() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let invoker = Arc::new(ScriptedInvoker::replying(json!({"safe": true})));
        let service = PostService::new(
            with_moderation(gateway, &invoker),
            SessionContext::authenticated("user1", None),
        );

        let mut input = CreatePostInput::text(PostType::Story, "hello");
        input.target_amount = Some(5_000_000);
        input.urgency = Some(Urgency::High);
        let created = service.create(input).await.unwrap();

        assert_eq!(created.post_type, PostType::Story);
        assert_eq!(created.content.as_deref(), Some("hello"));
        assert_eq!(created.target_amount, None);
        assert_eq!(created.urgency, None);
        assert_eq!(created.moderation_status, ModerationStatus::Pending);
        assert_eq!(memory.posts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_need_keeps_economics() {
        let (gateway, _memory, _dir) = gateway_with_memory();
        let invoker = Arc::new(ScriptedInvoker::replying(json!({"safe": true})));
        let service = PostService::new(
            with_moderation(gateway, &invoker),
            SessionContext::authenticated("user1", None),
        );

        let mut input = CreatePostInput::text(PostType::Need, "Cần 50 phần cơm");
        input.target_amount = Some(1_500_000);
        input.beneficiaries_count = Some(50);
        input.urgency = Some(Urgency::Critical);
        let created = service.create(input).await.unwrap();

        assert_eq!(created.target_amount, Some(1_500_000));
        assert_eq!(created.beneficiaries_count, Some(50));
        assert_eq!(created.urgency, Some(Urgency::Critical));
    }

    #[tokio::test]
    async fn test_rejected_content_removes_media_and_is_not_persisted() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let invoker = Arc::new(ScriptedInvoker::replying(
            json!({"safe": false, "reason": "Hình ảnh bạo lực"}),
        ));
        let gateway = with_moderation(gateway, &invoker);
        let url = upload(&gateway, "posts/user1/1_a.jpg").await;
        let foreign = "https://elsewhere.example/b.jpg".to_string();

        let service = PostService::new(gateway.clone(), SessionContext::authenticated("user1", None));
        let mut input = CreatePostInput::text(PostType::Story, "xem ảnh");
        input.media = vec![
            MediaReference::from_url(url.clone()),
            MediaReference::from_url(foreign),
        ];

        let err = service.create(input).await.unwrap_err();

        match err {
            AppError::ContentRejected { reason } => assert_eq!(reason, "Hình ảnh bạo lực"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(memory.posts().await.is_empty());
        assert!(!gateway.storage.exists("posts/user1/1_a.jpg").await.unwrap());
        assert!(url.starts_with(MEDIA_BASE_URL));

        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls[0]["imageUrls"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_post_never_touches_other_users_media() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let invoker = Arc::new(ScriptedInvoker::replying(json!({"safe": false, "reason": "spam"})));
        let gateway = with_moderation(gateway, &invoker);
        let victim_url = upload(&gateway, "posts/victim/1_a.jpg").await;

        let attacker = PostService::new(gateway.clone(), SessionContext::authenticated("attacker", None));
        let mut input = CreatePostInput::text(PostType::Story, "xem ảnh");
        input.media = vec![MediaReference::from_url(victim_url)];

        let err = attacker.create(input).await.unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(invoker.call_count(), 0);
        assert!(memory.posts().await.is_empty());
        assert!(gateway.storage.exists("posts/victim/1_a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_cannot_attach_other_users_media() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let victim_url = upload(&gateway, "posts/victim/1_a.jpg").await;
        memory
            .seed_post(approved_post("p1", PostType::Story, 1))
            .await;

        let author = PostService::new(gateway.clone(), SessionContext::authenticated("author1", None));
        let err = author
            .update(
                "p1",
                UpdatePostInput {
                    media: Some(vec![MediaReference::from_url(victim_url)]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(gateway.storage.exists("posts/victim/1_a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_keeps_foreign_media_already_on_a_post() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let own = upload(&gateway, "posts/author1/a.jpg").await;
        let foreign = upload(&gateway, "posts/victim/b.jpg").await;
        let mut post = approved_post("p1", PostType::Story, 1);
        post.media_urls = json!([own, foreign]);
        memory.seed_post(post).await;

        let service = PostService::new(gateway.clone(), SessionContext::authenticated("author1", None));
        service.delete("p1").await.unwrap();

        assert!(!gateway.storage.exists("posts/author1/a.jpg").await.unwrap());
        assert!(gateway.storage.exists("posts/victim/b.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_never_reaches_outside_storage_root() {
        let (gateway, _memory, _dir) = gateway_with_memory();
        let outside = std::env::temp_dir()
            .join(format!("fun-core-outside-{}", IdGenerator::new().generate()));
        tokio::fs::write(&outside, b"keep").await.unwrap();

        let service = PostService::new(gateway, SessionContext::authenticated("user1", None));
        let mut input = CreatePostInput::text(PostType::Story, "xem ảnh");
        input.media = vec![MediaReference::from_url(format!(
            "{MEDIA_BASE_URL}/{}",
            outside.display()
        ))];
        let created = service.create(input).await.unwrap();
        service.delete(&created.id).await.unwrap();

        assert!(tokio::fs::try_exists(&outside).await.unwrap());
        let _ = tokio::fs::remove_file(outside).await;
    }

    #[tokio::test]
    async fn test_moderation_outage_fails_open() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let invoker = Arc::new(ScriptedInvoker::unreachable());
        let service = PostService::new(
            with_moderation(gateway, &invoker),
            SessionContext::authenticated("user1", None),
        );

        let created = service
            .create(CreatePostInput::text(PostType::Update, "cập nhật"))
            .await
            .unwrap();

        assert_eq!(memory.posts().await[0].id, created.id);
    }

    #[tokio::test]
    async fn test_moderation_internal_error_fails_loudly() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let invoker = Arc::new(ScriptedInvoker::broken());
        let service = PostService::new(
            with_moderation(gateway, &invoker),
            SessionContext::authenticated("user1", None),
        );

        let err = service
            .create(CreatePostInput::text(PostType::Update, "cập nhật"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert!(memory.posts().await.is_empty());
    }

    #[tokio::test]
    async fn test_media_only_post_is_allowed() {
        let (gateway, _memory, _dir) = gateway_with_memory();
        let service = PostService::new(gateway, SessionContext::authenticated("user1", None));

        let mut input = CreatePostInput::text(PostType::Story, "");
        input.media = vec![MediaReference::from_url("https://cdn.example/v.mp4")];
        let created = service.create(input).await.unwrap();

        assert_eq!(created.content, None);
        assert_eq!(
            created.media_urls,
            json!([{"url": "https://cdn.example/v.mp4", "type": "video"}])
        );
    }

    #[tokio::test]
    async fn test_update_owner_only() {
        let (gateway, memory, _dir) = gateway_with_memory();
        memory
            .seed_post(approved_post("p1", PostType::Story, 1))
            .await;

        let stranger = PostService::new(gateway.clone(), SessionContext::authenticated("stranger", None));
        let err = stranger
            .update(
                "p1",
                UpdatePostInput {
                    content: Some("hijack".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let author = PostService::new(gateway, SessionContext::authenticated("author1", None));
        let updated = author
            .update(
                "p1",
                UpdatePostInput {
                    content: Some("đã sửa".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.content.as_deref(), Some("đã sửa"));
    }

    #[tokio::test]
    async fn test_update_removes_dropped_media() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let kept = upload(&gateway, "posts/author1/keep.jpg").await;
        let dropped = upload(&gateway, "posts/author1/drop.jpg").await;

        let mut post = approved_post("p1", PostType::Story, 1);
        post.media_urls = json!([kept.clone(), dropped]);
        memory.seed_post(post).await;

        let service = PostService::new(gateway.clone(), SessionContext::authenticated("author1", None));
        service
            .update(
                "p1",
                UpdatePostInput {
                    media: Some(vec![MediaReference::from_url(kept)]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(gateway.storage.exists("posts/author1/keep.jpg").await.unwrap());
        assert!(!gateway.storage.exists("posts/author1/drop.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_post_and_media() {
        let (gateway, memory, _dir) = gateway_with_memory();
        let url = upload(&gateway, "posts/author1/a.jpg").await;
        let mut post = approved_post("p1", PostType::Story, 1);
        post.media_urls = json!([url]);
        memory.seed_post(post).await;

        let service = PostService::new(gateway.clone(), SessionContext::authenticated("author1", None));
        service.delete("p1").await.unwrap();

        assert!(memory.posts().await.is_empty());
        assert!(!gateway.storage.exists("posts/author1/a.jpg").await.unwrap());
        assert!(matches!(
            service.delete("p1").await,
            Err(AppError::PostNotFound(_))
        ));
    }
}
