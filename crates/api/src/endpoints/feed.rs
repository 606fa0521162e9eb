//! Feed endpoints.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use fun_common::AppResult;
use fun_core::{FeedPage, FeedPostView, FeedService};
use fun_db::FeedFilter;
use fun_db::entities::feed_post::PostType;
use serde::Deserialize;

use crate::{extractors::Session, middleware::AppState, response::ApiResponse};

/// Feed filter query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub post_type: Option<PostType>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
    /// Zero-based page index; only read by `/feed/page`.
    #[serde(default)]
    pub page: u64,
}

impl FeedQuery {
    fn filter(&self) -> FeedFilter {
        FeedFilter {
            post_type: self.post_type,
            category: self.category.clone(),
            location: self.location.clone(),
            search: self.search.clone(),
        }
        .normalized()
    }
}

/// Bounded list of the newest visible posts.
async fn bounded(
    Session(session): Session,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<Vec<FeedPostView>>> {
    let posts = FeedService::new(state.gateway, session)
        .fetch_bounded(&query.filter())
        .await?;
    Ok(ApiResponse::ok(posts))
}

/// One page of the infinite feed.
async fn page(
    Session(session): Session,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<FeedPage>> {
    let page = FeedService::new(state.gateway, session)
        .fetch_page(&query.filter(), query.page)
        .await?;
    Ok(ApiResponse::ok(page))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(bounded))
        .route("/page", get(page))
}
