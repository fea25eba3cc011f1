use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

mod anthropic;
mod error;
mod gemini;
mod openai;
mod response;
#[cfg(test)]
mod tests;

pub use anthropic::AnthropicClient;
pub use error::AIError;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use response::{ChatRequest, Message, ModelReply, ToolCall, ToolSpec};

use crate::config::{AIConfig, AIProvider};

const INITIAL_RETRY_DELAY: u64 = 1000; // milliseconds
const MAX_RETRY_DELAY: u64 = 10000; // 10 seconds max delay

/// A chat model that understands tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError>;
}

#[derive(Debug, Clone)]
pub(crate) struct RetryConfig {
    max_retries: u32,
    initial_delay: u64,
    max_delay: u64,
}

impl RetryConfig {
    pub(crate) fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: INITIAL_RETRY_DELAY,
            max_delay: MAX_RETRY_DELAY,
        }
    }

    fn should_retry(&self, error: &AIError) -> bool {
        matches!(
            error,
            AIError::RateLimitError(_) | AIError::NetworkError(_)
        )
    }

    fn get_delay(&self, attempt: u32) -> Duration {
        let delay = 2u64
            .checked_pow(attempt)
            .map_or(u64::MAX, |factor| self.initial_delay.saturating_mul(factor));
        Duration::from_millis(delay.min(self.max_delay))
    }
}

/// Runs `f` once, then again for each retryable failure up to `max_retries` times.
pub(crate) async fn with_retries<T, F, Fut>(config: &RetryConfig, f: F) -> Result<T, AIError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, AIError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < config.max_retries && config.should_retry(&e) => {
                let delay = config.get_delay(attempt);
                warn!(error = %e, ?delay, "Model request failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Connection settings shared by every provider client.
#[derive(Debug, Clone)]
pub(crate) struct HttpSettings {
    pub client: reqwest::Client,
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl HttpSettings {
    pub(crate) fn new(config: &AIConfig, default_base: &str) -> Result<Self, AIError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AIError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config
            .api_url
            .as_deref()
            .unwrap_or(default_base)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            timeout,
            retry: RetryConfig::new(config.max_retries),
        })
    }

    /// POSTs a JSON body and returns the raw response text of a 200 reply.
    pub(crate) async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &serde_json::Value,
    ) -> Result<String, AIError> {
        debug!(url = %url, "Sending model request");

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        match response.status() {
            StatusCode::OK => (),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AIError::RateLimitError("Rate limit exceeded".to_string()));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AIError::AuthenticationError("Invalid API key".to_string()));
            }
            status => {
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Could not read error response".to_string());
                return Err(AIError::APIError(format!(
                    "Unexpected status code: {} - Response: {}",
                    status, error_body
                )));
            }
        }

        response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))
    }

    fn map_transport_error(&self, error: reqwest::Error) -> AIError {
        if error.is_timeout() {
            AIError::Timeout(self.timeout)
        } else {
            AIError::NetworkError(error.to_string())
        }
    }
}

/// Builds the client for the configured provider.
pub fn build_model(config: &AIConfig, api_key: String) -> Result<Arc<dyn ChatModel>, AIError> {
    if api_key.trim().is_empty() {
        return Err(AIError::ValidationError("API key is empty".to_string()));
    }

    let model: Arc<dyn ChatModel> = match config.provider {
        AIProvider::Gemini => Arc::new(GeminiClient::new(config, api_key)?),
        AIProvider::Anthropic => Arc::new(AnthropicClient::new(config, api_key)?),
        AIProvider::OpenAI => Arc::new(OpenAIClient::new(config, api_key)?),
    };
    Ok(model)
}
