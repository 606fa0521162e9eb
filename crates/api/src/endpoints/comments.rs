//! Comment endpoints addressed by comment ID.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::delete,
};
use fun_common::AppResult;
use fun_core::CommentService;

use crate::{extractors::AuthSession, middleware::AppState, response};

/// Delete one of the caller's comments.
async fn remove(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    CommentService::new(state.gateway, session)
        .delete(&comment_id)
        .await?;
    Ok(response::ok())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", delete(remove))
}
