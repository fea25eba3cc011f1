use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AIError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Rate limit error: {0}")]
    RateLimitError(String),

    #[error("API error: {0}")]
    APIError(String),

    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<serde_json::Error> for AIError {
    fn from(error: serde_json::Error) -> Self {
        AIError::ParseError(format!("JSON serialization error: {}", error))
    }
}
