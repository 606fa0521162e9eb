//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use fun_common::AppError;
use fun_core::SessionContext;

/// Session of the caller; anonymous when no valid token was sent.
#[derive(Debug, Clone)]
pub struct Session(pub SessionContext);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        Ok(Self(
            parts
                .extensions
                .get::<SessionContext>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

/// Session of a signed-in caller.
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionContext);

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .filter(|s| s.is_authenticated())
            .cloned()
            .map(AuthSession)
            .ok_or(AppError::Unauthorized)
    }
}
