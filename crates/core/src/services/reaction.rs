//! Reaction service.

use std::sync::LazyLock;

use chrono::Utc;
use fun_common::{AppError, AppResult, IdGenerator};
use fun_db::entities::feed_reaction;
use regex::Regex;
use tracing::{debug, info};

use super::change::{ChangeEvent, ChangeKind};
use super::gateway::DataGateway;
use super::session::SessionContext;

static REACTION_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,31}$").ok());

/// Reaction service: one reaction per user per post.
#[derive(Clone)]
pub struct ReactionService {
    gateway: DataGateway,
    session: SessionContext,
    id_gen: IdGenerator,
}

impl ReactionService {
    /// Create a reaction service for a session.
    #[must_use]
    pub const fn new(gateway: DataGateway, session: SessionContext) -> Self {
        Self {
            gateway,
            session,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the caller's reaction on a post, replacing any previous one.
    ///
    /// Always deletes the existing row before inserting the new one. The two
    /// steps are not atomic; if another device of the same user inserts in
    /// between, the unique index rejects our insert and the sequence is
    /// replayed once so the latest call wins.
    pub async fn toggle(&self, post_id: &str, reaction_type: &str) -> AppResult<feed_reaction::Model> {
        let user_id = self.session.require_user()?;
        let reaction_type = reaction_type.trim().to_lowercase();
        if !REACTION_TOKEN
            .as_ref()
            .is_some_and(|re| re.is_match(&reaction_type))
        {
            return Err(AppError::BadRequest(format!(
                "Invalid reaction type: {reaction_type}"
            )));
        }

        if self.gateway.posts.find_by_id(post_id).await?.is_none() {
            return Err(AppError::PostNotFound(post_id.to_string()));
        }

        let created = match self.replace(post_id, user_id, &reaction_type).await {
            Err(AppError::Conflict(_)) => {
                debug!(post_id = %post_id, user_id = %user_id, "Concurrent reaction detected, replaying");
                self.replace(post_id, user_id, &reaction_type).await?
            }
            other => other?,
        };

        info!(post_id = %post_id, user_id = %user_id, reaction = %reaction_type, "Reaction set");
        self.gateway
            .announce(ChangeEvent::reaction(ChangeKind::Insert, &created.id, post_id))
            .await;

        Ok(created)
    }

    /// Remove the caller's reaction. A no-op when there is none.
    pub async fn remove(&self, post_id: &str) -> AppResult<()> {
        let user_id = self.session.require_user()?;

        let existing = self
            .gateway
            .reactions
            .find_by_post_and_user(post_id, user_id)
            .await?;
        let removed = self
            .gateway
            .reactions
            .delete_by_post_and_user(post_id, user_id)
            .await?;

        if removed > 0 {
            info!(post_id = %post_id, user_id = %user_id, "Reaction removed");
            let record_id = existing.map_or_else(|| post_id.to_string(), |r| r.id);
            self.gateway
                .announce(ChangeEvent::reaction(ChangeKind::Delete, &record_id, post_id))
                .await;
        }

        Ok(())
    }

    /// The caller's reaction on a post, if signed in and reacted.
    pub async fn viewer_reaction(&self, post_id: &str) -> AppResult<Option<String>> {
        let Some(user_id) = self.session.user_id() else {
            return Ok(None);
        };

        Ok(self
            .gateway
            .reactions
            .find_by_post_and_user(post_id, user_id)
            .await?
            .map(|r| r.reaction_type))
    }

    async fn replace(
        &self,
        post_id: &str,
        user_id: &str,
        reaction_type: &str,
    ) -> AppResult<feed_reaction::Model> {
        self.gateway
            .reactions
            .delete_by_post_and_user(post_id, user_id)
            .await?;

        self.gateway
            .reactions
            .insert(feed_reaction::Model {
                id: self.id_gen.generate(),
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
                reaction_type: reaction_type.to_string(),
                created_at: Utc::now().into(),
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{approved_post, gateway_with_memory};
    use fun_db::entities::feed_post::PostType;
    use std::sync::Arc;

    async fn setup(user: &str) -> (ReactionService, Arc<fun_db::test_utils::InMemoryGateway>) {
        let (gateway, memory, _dir) = gateway_with_memory();
        memory.seed_post(approved_post("p1", PostType::Story, 1)).await;
        (
            ReactionService::new(gateway, SessionContext::authenticated(user, None)),
            memory,
        )
    }

    #[tokio::test]
    async fn test_second_reaction_replaces_first() {
        let (service, memory) = setup("user1").await;

        service.toggle("p1", "love").await.unwrap();
        service.toggle("p1", "like").await.unwrap();

        let reactions = memory.reactions().await;
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].reaction_type, "like");
        assert_eq!(service.viewer_reaction("p1").await.unwrap().as_deref(), Some("like"));
    }

    #[tokio::test]
    async fn test_remove_twice_is_noop() {
        let (service, memory) = setup("user1").await;
        service.toggle("p1", "haha").await.unwrap();

        service.remove("p1").await.unwrap();
        service.remove("p1").await.unwrap();

        assert!(memory.reactions().await.is_empty());
        assert_eq!(service.viewer_reaction("p1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_without_reaction_succeeds() {
        let (service, _memory) = setup("user1").await;
        assert!(service.remove("p1").await.is_ok());
    }

    #[tokio::test]
    async fn test_uniqueness_under_arbitrary_sequences() {
        let (service, memory) = setup("user1").await;
        let ops = ["like", "-", "love", "love", "-", "-", "wow", "sad", "-", "angry"];

        for op in ops {
            if op == "-" {
                service.remove("p1").await.unwrap();
            } else {
                service.toggle("p1", op).await.unwrap();
            }
            let rows = memory
                .reactions()
                .await
                .into_iter()
                .filter(|r| r.post_id == "p1" && r.user_id == "user1")
                .count();
            assert!(rows <= 1);
        }

        assert_eq!(memory.reactions().await[0].reaction_type, "angry");
    }

    #[tokio::test]
    async fn test_concurrent_toggles_keep_one_row() {
        let (service, memory) = setup("user1").await;
        let other_device = service.clone();

        let (a, b) = tokio::join!(service.toggle("p1", "like"), other_device.toggle("p1", "love"));
        assert!(a.is_ok() || b.is_ok());

        assert_eq!(memory.reactions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let (service, memory) = setup("user1").await;
        service.toggle("p1", "like").await.unwrap();

        let other = ReactionService::new(
            service.gateway.clone(),
            SessionContext::authenticated("user2", None),
        );
        other.toggle("p1", "love").await.unwrap();

        assert_eq!(memory.reactions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_validation() {
        let (service, _memory) = setup("user1").await;

        assert!(matches!(
            service.toggle("p1", "<script>").await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.toggle("missing", "like").await,
            Err(AppError::PostNotFound(_))
        ));

        let anonymous = ReactionService::new(service.gateway.clone(), SessionContext::anonymous());
        assert!(matches!(
            anonymous.toggle("p1", "like").await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(anonymous.remove("p1").await, Err(AppError::Unauthorized)));
    }
}
