//! Explicit session context.

use fun_common::{AppError, AppResult};

/// The caller a service acts on behalf of.
///
/// Built once per request (or per view) and handed to service constructors,
/// so no service looks up the current user on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    user_id: Option<String>,
    access_token: Option<String>,
}

impl SessionContext {
    /// A session without a signed-in user.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session for a signed-in user.
    #[must_use]
    pub fn authenticated(user_id: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            access_token,
        }
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Access token forwarded to serverless functions.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The signed-in user, or `Unauthorized`.
    pub fn require_user(&self) -> AppResult<&str> {
        self.user_id.as_deref().ok_or(AppError::Unauthorized)
    }
}
