//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use fun_core::{ChangeFeed, DataGateway, MediaUploader, SessionContext};

use crate::auth::SessionVerifier;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: DataGateway,
    pub uploader: MediaUploader,
    pub changes: Arc<dyn ChangeFeed>,
    pub verifier: SessionVerifier,
}

impl AppState {
    /// Build state around a gateway. The uploader shares the gateway's storage.
    #[must_use]
    pub fn new(gateway: DataGateway, changes: Arc<dyn ChangeFeed>, verifier: SessionVerifier) -> Self {
        Self {
            uploader: MediaUploader::new(Arc::clone(&gateway.storage)),
            gateway,
            changes,
            verifier,
        }
    }
}

/// Resolve the bearer token into a session.
///
/// Every request leaves with a [`SessionContext`] in its extensions;
/// missing or invalid tokens give an anonymous one.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let session = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.verifier.verify(token.trim()))
        .unwrap_or_else(SessionContext::anonymous);

    req.extensions_mut().insert(session);
    next.run(req).await
}
