//! Feed post repository.

use std::sync::Arc;

use async_trait::async_trait;
use fun_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
    sea_query::{Expr, Func, LikeExpr},
};

use crate::entities::{FeedPost, feed_post};
use crate::gateway::{FeedFilter, PostStore};

/// Feed post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Build the visibility plus filter condition used by feed reads.
    fn visible_condition(filter: &FeedFilter) -> Condition {
        let mut condition = Condition::all()
            .add(feed_post::Column::IsActive.eq(true))
            .add(feed_post::Column::ModerationStatus.eq(feed_post::ModerationStatus::Approved));

        if let Some(post_type) = filter.post_type {
            condition = condition.add(feed_post::Column::PostType.eq(post_type));
        }

        if let Some(category) = &filter.category {
            condition = condition.add(feed_post::Column::Category.eq(category.as_str()));
        }

        if let Some(location) = &filter.location {
            condition = condition.add(lower_like(feed_post::Column::Location, location));
        }

        if let Some(search) = &filter.search {
            condition = condition.add(
                Condition::any()
                    .add(lower_like(feed_post::Column::Title, search))
                    .add(lower_like(feed_post::Column::Content, search)),
            );
        }

        condition
    }
}

/// `lower(col) LIKE '%needle%'`, with `needle` matched literally.
fn lower_like(column: feed_post::Column, needle: &str) -> sea_orm::sea_query::SimpleExpr {
    let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

const LIKE_ESCAPE: char = '\\';

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl PostStore for PostRepository {
    async fn find_visible(
        &self,
        filter: &FeedFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<feed_post::Model>> {
        FeedPost::find()
            .filter(Self::visible_condition(filter))
            .order_by_desc(feed_post::Column::CreatedAt)
            .order_by_desc(feed_post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<feed_post::Model>> {
        FeedPost::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert(&self, post: feed_post::Model) -> AppResult<feed_post::Model> {
        feed_post::ActiveModel::from(post)
            .reset_all()
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update(&self, post: feed_post::Model) -> AppResult<feed_post::Model> {
        feed_post::ActiveModel::from(post)
            .reset_all()
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        FeedPost::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
