//! API endpoints.

mod comments;
mod feed;
mod media;
mod posts;

use std::time::Duration;

use axum::{Router, routing::get};
use tower_http::timeout::TimeoutLayer;

use crate::middleware::AppState;
use crate::streaming::streaming_handler;

/// Time limit for JSON endpoints. Uploads and the streaming socket are exempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the API router.
pub fn router() -> Router<AppState> {
    let json = Router::new()
        .nest("/feed", feed::router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    Router::new()
        .merge(json)
        .nest("/media", media::router())
        .route("/streaming", get(streaming_handler))
}
