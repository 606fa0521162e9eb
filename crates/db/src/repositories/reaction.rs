//! Feed reaction repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fun_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, SqlErr,
};
use tracing::debug;

use super::PostCount;
use crate::entities::{FeedReaction, feed_reaction};
use crate::gateway::ReactionStore;

/// Feed reaction repository for database operations.
#[derive(Clone)]
pub struct ReactionRepository {
    db: Arc<DatabaseConnection>,
}

impl ReactionRepository {
    /// Create a new reaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

/// Map an insert failure, surfacing the `(post_id, user_id)` unique index as a conflict.
fn map_insert_error(e: &DbErr) -> AppError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = e.sql_err() {
        debug!(detail = %detail, "Duplicate reaction rejected by unique index");
        return AppError::Conflict("Reaction already exists for this post".to_string());
    }
    AppError::Database(e.to_string())
}

#[async_trait]
impl ReactionStore for ReactionRepository {
    async fn delete_by_post_and_user(&self, post_id: &str, user_id: &str) -> AppResult<u64> {
        let result = FeedReaction::delete_many()
            .filter(feed_reaction::Column::PostId.eq(post_id))
            .filter(feed_reaction::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    async fn insert(&self, reaction: feed_reaction::Model) -> AppResult<feed_reaction::Model> {
        feed_reaction::ActiveModel::from(reaction)
            .reset_all()
            .insert(self.db.as_ref())
            .await
            .map_err(|e| map_insert_error(&e))
    }

    async fn find_by_post_and_user(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> AppResult<Option<feed_reaction::Model>> {
        FeedReaction::find()
            .filter(feed_reaction::Column::PostId.eq(post_id))
            .filter(feed_reaction::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_by_posts(&self, post_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = FeedReaction::find()
            .select_only()
            .column(feed_reaction::Column::PostId)
            .column_as(feed_reaction::Column::Id.count(), "count")
            .filter(feed_reaction::Column::PostId.is_in(post_ids.to_vec()))
            .group_by(feed_reaction::Column::PostId)
            .into_model::<PostCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(PostCount::into_map(rows))
    }

    async fn find_by_posts_and_user(
        &self,
        post_ids: &[String],
        user_id: &str,
    ) -> AppResult<Vec<feed_reaction::Model>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        FeedReaction::find()
            .filter(feed_reaction::Column::PostId.is_in(post_ids.to_vec()))
            .filter(feed_reaction::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
