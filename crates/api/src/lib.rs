//! HTTP API layer for FUN Charity.
//!
//! This crate provides the REST API and change streaming:
//!
//! - **Endpoints**: feed reads, posts, reactions, comments and media uploads
//! - **Extractors**: session resolution from bearer tokens
//! - **Streaming**: WebSocket notifications of feed table changes
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod auth;
pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

pub use auth::SessionVerifier;
pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
pub use streaming::streaming_handler;
