//! Pre-write content moderation gate.

use fun_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::functions::FunctionInvokerService;

/// Default moderation function name.
pub const DEFAULT_MODERATION_FUNCTION: &str = "moderate-content";

/// Payload sent to the moderation function.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRequest<'a> {
    pub content: &'a str,
    pub image_urls: &'a [String],
}

/// Verdict returned by the moderation function.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationVerdict {
    pub safe: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Result of a moderation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationOutcome {
    /// Content may be published.
    Approved,
    /// Content violates the community guidelines.
    Rejected { reason: String },
    /// The moderation service could not be reached or gave no usable verdict.
    Unavailable,
}

/// Moderation gate over a serverless function.
///
/// Fails open: an unreachable or misbehaving moderation service yields
/// [`ModerationOutcome::Unavailable`] and the caller proceeds. Errors that are
/// not about the service itself still propagate.
#[derive(Clone)]
pub struct ModerationGate {
    invoker: FunctionInvokerService,
    function_name: String,
}

impl ModerationGate {
    /// Create a gate calling `function_name`.
    #[must_use]
    pub fn new(invoker: FunctionInvokerService, function_name: impl Into<String>) -> Self {
        Self {
            invoker,
            function_name: function_name.into(),
        }
    }

    /// Check text and media before they are persisted.
    pub async fn check(
        &self,
        content: &str,
        image_urls: &[String],
        auth_token: Option<&str>,
    ) -> AppResult<ModerationOutcome> {
        let request = ModerationRequest {
            content,
            image_urls,
        };
        let payload = serde_json::to_value(&request)
            .map_err(|e| AppError::Internal(format!("Failed to encode moderation request: {e}")))?;

        let response = match self
            .invoker
            .invoke(&self.function_name, &payload, auth_token)
            .await
        {
            Ok(response) => response,
            Err(AppError::ExternalService(message)) => {
                warn!(error = %message, "Moderation service unavailable, allowing content");
                return Ok(ModerationOutcome::Unavailable);
            }
            Err(e) => return Err(e),
        };

        let verdict: ModerationVerdict = match serde_json::from_value(response) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "Moderation service returned no verdict, allowing content");
                return Ok(ModerationOutcome::Unavailable);
            }
        };

        if verdict.safe {
            debug!("Content approved by moderation");
            Ok(ModerationOutcome::Approved)
        } else {
            let reason = verdict
                .reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "Nội dung không phù hợp".to_string());
            debug!(reason = %reason, "Content rejected by moderation");
            Ok(ModerationOutcome::Rejected { reason })
        }
    }
}
