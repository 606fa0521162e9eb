//! Comment service.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use fun_common::{AppError, AppResult, IdGenerator};
use fun_db::entities::feed_comment;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::change::{ChangeEvent, ChangeKind};
use super::feed::AuthorSnippet;
use super::gateway::DataGateway;
use super::session::SessionContext;

/// Input for adding a comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddCommentInput {
    pub post_id: String,
    #[validate(length(max = 2000))]
    pub content: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    /// Comment being replied to.
    pub parent_comment_id: Option<String>,
}

/// A comment as shown under a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub parent_comment_id: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub author: Option<AuthorSnippet>,
}

/// A top-level comment and every reply beneath it, flattened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentThread {
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

/// Comment service.
#[derive(Clone)]
pub struct CommentService {
    gateway: DataGateway,
    session: SessionContext,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a comment service for a session.
    #[must_use]
    pub const fn new(gateway: DataGateway, session: SessionContext) -> Self {
        Self {
            gateway,
            session,
            id_gen: IdGenerator::new(),
        }
    }

    /// Add a comment or a reply.
    ///
    /// Only posts visible in the feed accept comments.
    pub async fn add(&self, input: AddCommentInput) -> AppResult<feed_comment::Model> {
        let user_id = self.session.require_user()?;
        input.validate()?;

        let content = input.content.filter(|c| !c.trim().is_empty());
        let image_url = input.image_url.filter(|u| !u.trim().is_empty());
        if content.is_none() && image_url.is_none() {
            return Err(AppError::Validation(
                "Comment needs text or an image".to_string(),
            ));
        }

        let post_visible = self
            .gateway
            .posts
            .find_by_id(&input.post_id)
            .await?
            .is_some_and(|post| post.is_visible());
        if !post_visible {
            return Err(AppError::PostNotFound(input.post_id));
        }

        if let Some(parent_id) = &input.parent_comment_id {
            let parent = self
                .gateway
                .comments
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::CommentNotFound(parent_id.clone()))?;
            if parent.post_id != input.post_id {
                return Err(AppError::BadRequest(
                    "Parent comment belongs to another post".to_string(),
                ));
            }
        }

        let comment = self
            .gateway
            .comments
            .insert(feed_comment::Model {
                id: self.id_gen.generate(),
                post_id: input.post_id,
                user_id: user_id.to_string(),
                parent_comment_id: input.parent_comment_id,
                content,
                image_url,
                created_at: Utc::now().into(),
            })
            .await?;

        info!(comment_id = %comment.id, post_id = %comment.post_id, "Comment added");
        self.gateway
            .announce(ChangeEvent::comment(ChangeKind::Insert, &comment.id, &comment.post_id))
            .await;

        Ok(comment)
    }

    /// Delete one of the caller's comments.
    pub async fn delete(&self, comment_id: &str) -> AppResult<()> {
        let user_id = self.session.require_user()?;

        let comment = self
            .gateway
            .comments
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound(comment_id.to_string()))?;

        if comment.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can delete this comment".to_string(),
            ));
        }

        self.gateway.comments.delete(comment_id).await?;
        info!(comment_id = %comment_id, "Comment deleted");
        self.gateway
            .announce(ChangeEvent::comment(ChangeKind::Delete, comment_id, &comment.post_id))
            .await;

        Ok(())
    }

    /// Comments on a post, one level deep.
    ///
    /// Replies to replies are listed under their top-level ancestor. A reply
    /// whose parent no longer exists is shown as a top-level comment.
    pub async fn thread(&self, post_id: &str) -> AppResult<Vec<CommentThread>> {
        let comments = self.gateway.comments.find_by_post(post_id).await?;

        let mut author_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();
        let authors: HashMap<String, AuthorSnippet> = self
            .gateway
            .profiles
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), AuthorSnippet::from(p)))
            .collect();

        Ok(build_threads(comments, &authors))
    }
}

/// Group comments (oldest first) into one-level threads.
fn build_threads(
    comments: Vec<feed_comment::Model>,
    authors: &HashMap<String, AuthorSnippet>,
) -> Vec<CommentThread> {
    let parents: HashMap<String, Option<String>> = comments
        .iter()
        .map(|c| (c.id.clone(), c.parent_comment_id.clone()))
        .collect();

    // Walk up to the top-level ancestor; bounded so a cycle cannot loop forever.
    let root_of = |id: &str| -> String {
        let mut current = id.to_string();
        for _ in 0..parents.len() {
            match parents.get(&current).cloned().flatten() {
                Some(parent) if parents.contains_key(&parent) => current = parent,
                _ => break,
            }
        }
        current
    };

    let mut threads: Vec<CommentThread> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut replies: Vec<(String, CommentView)> = Vec::new();

    for comment in comments {
        let root = root_of(&comment.id);
        let view = CommentView {
            author: authors.get(&comment.user_id).cloned(),
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            parent_comment_id: comment.parent_comment_id,
            content: comment.content,
            image_url: comment.image_url,
            created_at: comment.created_at,
        };

        if root == view.id {
            index.insert(view.id.clone(), threads.len());
            threads.push(CommentThread {
                comment: view,
                replies: Vec::new(),
            });
        } else {
            replies.push((root, view));
        }
    }

    for (root, reply) in replies {
        if let Some(&i) = index.get(&root) {
            threads[i].replies.push(reply);
        } else {
            // Only reachable through a parent cycle; surface the comment anyway.
            index.insert(reply.id.clone(), threads.len());
            threads.push(CommentThread {
                comment: reply,
                replies: Vec::new(),
            });
        }
    }

    threads
}
