//! Serverless function invocation.
//!
//! Moderation, matching and reward settlement run as hosted functions; the
//! core only sends a JSON payload and reads back a JSON response.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fun_common::{AppError, AppResult, config::FunctionsConfig};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Invokes a named serverless function.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Call `name` with `payload`, forwarding the caller's access token.
    ///
    /// Transport failures, non-success statuses and unreadable responses are
    /// reported as `AppError::ExternalService`.
    async fn invoke(&self, name: &str, payload: &Value, auth_token: Option<&str>)
    -> AppResult<Value>;
}

/// Wrapper for boxed `FunctionInvoker` trait object.
pub type FunctionInvokerService = Arc<dyn FunctionInvoker>;

/// Invoker for when no function host is configured.
#[derive(Clone, Default)]
pub struct NoOpFunctionInvoker;

#[async_trait]
impl FunctionInvoker for NoOpFunctionInvoker {
    async fn invoke(
        &self,
        name: &str,
        _payload: &Value,
        _auth_token: Option<&str>,
    ) -> AppResult<Value> {
        Err(AppError::ExternalService(format!(
            "Function host not configured, cannot invoke {name}"
        )))
    }
}

/// HTTP invoker: `POST {base_url}/{name}` with a bearer token.
#[derive(Clone)]
pub struct HttpFunctionInvoker {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFunctionInvoker {
    /// Create an invoker from configuration.
    ///
    /// The base URL must be an absolute `http` or `https` URL.
    pub fn new(config: &FunctionsConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::Config(format!("Invalid functions base URL: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "Unsupported functions URL scheme: {}",
                base_url.scheme()
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// URL a function is served at.
    #[must_use]
    pub fn function_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }
}

#[async_trait]
impl FunctionInvoker for HttpFunctionInvoker {
    async fn invoke(
        &self,
        name: &str,
        payload: &Value,
        auth_token: Option<&str>,
    ) -> AppResult<Value> {
        let url = self.function_url(name);
        debug!(function = %name, "Invoking function");

        let mut request = self.http_client.post(&url).json(payload);
        if let Some(token) = auth_token.or(self.api_key.as_deref()) {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(api_key) = &self.api_key {
            request = request.header("apikey", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Function {name} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Function {name} returned {status}: {body}"
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Function {name} returned invalid JSON: {e}"))
        })
    }
}
