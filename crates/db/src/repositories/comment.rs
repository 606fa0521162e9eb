//! Feed comment repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fun_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use super::PostCount;
use crate::entities::{FeedComment, feed_comment};
use crate::gateway::CommentStore;

/// Feed comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentStore for CommentRepository {
    async fn insert(&self, comment: feed_comment::Model) -> AppResult<feed_comment::Model> {
        feed_comment::ActiveModel::from(comment)
            .reset_all()
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<feed_comment::Model>> {
        FeedComment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        FeedComment::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_by_post(&self, post_id: &str) -> AppResult<Vec<feed_comment::Model>> {
        FeedComment::find()
            .filter(feed_comment::Column::PostId.eq(post_id))
            .order_by_asc(feed_comment::Column::CreatedAt)
            .order_by_asc(feed_comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_by_posts(&self, post_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = FeedComment::find()
            .select_only()
            .column(feed_comment::Column::PostId)
            .column_as(feed_comment::Column::Id.count(), "count")
            .filter(feed_comment::Column::PostId.is_in(post_ids.to_vec()))
            .group_by(feed_comment::Column::PostId)
            .into_model::<PostCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(PostCount::into_map(rows))
    }
}
