//! Post, reaction and comment endpoints addressed by post ID.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use fun_common::AppResult;
use fun_core::{
    AddCommentInput, CommentService, CommentThread, CreatePostInput, FeedPostView, FeedService,
    PostService, ReactionService, UpdatePostInput,
};
use fun_db::entities::{feed_comment, feed_post, feed_reaction};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AuthSession, Session},
    middleware::AppState,
    response::{self, ApiResponse},
};

/// Post as returned by write endpoints.
#[derive(Serialize)]
pub struct PostResponse {
    pub id: String,
    pub user_id: String,
    pub post_type: feed_post::PostType,
    pub moderation_status: feed_post::ModerationStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<feed_post::Model> for PostResponse {
    fn from(p: feed_post::Model) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            post_type: p.post_type,
            moderation_status: p.moderation_status,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

/// Create a post.
async fn create(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> AppResult<ApiResponse<PostResponse>> {
    let created = PostService::new(state.gateway, session).create(input).await?;
    Ok(ApiResponse::created(created.into()))
}

/// Get a single visible post.
async fn show(
    Session(session): Session,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<FeedPostView>> {
    let post = FeedService::new(state.gateway, session)
        .get_post(&post_id)
        .await?;
    Ok(ApiResponse::ok(post))
}

/// Edit one of the caller's posts.
async fn update(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(input): Json<UpdatePostInput>,
) -> AppResult<ApiResponse<PostResponse>> {
    let updated = PostService::new(state.gateway, session)
        .update(&post_id, input)
        .await?;
    Ok(ApiResponse::ok(updated.into()))
}

/// Delete one of the caller's posts.
async fn remove(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    PostService::new(state.gateway, session)
        .delete(&post_id)
        .await?;
    Ok(response::ok())
}

/// Set reaction request.
#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub reaction_type: String,
}

/// Reaction response.
#[derive(Serialize)]
pub struct ReactionResponse {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub reaction_type: String,
    pub created_at: String,
}

impl From<feed_reaction::Model> for ReactionResponse {
    fn from(r: feed_reaction::Model) -> Self {
        Self {
            id: r.id,
            post_id: r.post_id,
            user_id: r.user_id,
            reaction_type: r.reaction_type,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// Set the caller's reaction, replacing any previous one.
async fn react(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<ReactRequest>,
) -> AppResult<ApiResponse<ReactionResponse>> {
    let reaction = ReactionService::new(state.gateway, session)
        .toggle(&post_id, &req.reaction_type)
        .await?;
    Ok(ApiResponse::ok(reaction.into()))
}

/// Remove the caller's reaction.
async fn unreact(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    ReactionService::new(state.gateway, session)
        .remove(&post_id)
        .await?;
    Ok(response::ok())
}

/// Add comment request.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub parent_comment_id: Option<String>,
}

/// Comment response.
#[derive(Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub parent_comment_id: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl From<feed_comment::Model> for CommentResponse {
    fn from(c: feed_comment::Model) -> Self {
        Self {
            id: c.id,
            post_id: c.post_id,
            user_id: c.user_id,
            parent_comment_id: c.parent_comment_id,
            content: c.content,
            image_url: c.image_url,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

/// List comments on a post as one-level threads.
async fn comments(
    Session(session): Session,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentThread>>> {
    let threads = CommentService::new(state.gateway, session)
        .thread(&post_id)
        .await?;
    Ok(ApiResponse::ok(threads))
}

/// Comment on a post or reply to a comment.
async fn comment(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let created = CommentService::new(state.gateway, session)
        .add(AddCommentInput {
            post_id,
            content: req.content,
            image_url: req.image_url,
            parent_comment_id: req.parent_comment_id,
        })
        .await?;
    Ok(ApiResponse::created(created.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/{id}", get(show).patch(update).delete(remove))
        .route("/{id}/reactions", post(react).delete(unreact))
        .route("/{id}/comments", get(comments).post(comment))
}
