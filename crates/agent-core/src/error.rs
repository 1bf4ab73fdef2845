//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model adapter returned an error response
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Model adapter unreachable or not responding
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Model adapter call exceeded its deadline
    #[error("Adapter timed out after {0}s")]
    AdapterTimeout(u64),

    /// Rate limited by the hosted endpoint
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Malformed tool-request syntax in a model response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments missing or of the wrong type
    #[error("Tool argument error: {0}")]
    ToolArgument(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// A tool with this name is already registered
    #[error("Tool already registered: {0}")]
    ToolAlreadyRegistered(String),

    /// Document format the reader cannot extract
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether a retry with backoff may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::AdapterUnavailable(_)
                | AgentError::AdapterTimeout(_)
                | AgentError::RateLimited(_)
                | AgentError::Io(_)
        )
    }

    /// Convert to a user-facing message that never leaks internal state
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Adapter(_) => "The model service returned an error. Please try again.".into(),
            AgentError::AdapterUnavailable(_) => {
                "The model service is currently unavailable. Please try again later.".into()
            }
            AgentError::AdapterTimeout(_) => {
                "The model service took too long to respond. Please try again.".into()
            }
            AgentError::RateLimited(_) => {
                "Too many requests right now. Please wait a moment and retry.".into()
            }
            AgentError::Auth(_) => "Authentication with the model service failed. Check your API key.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolArgument(msg) => format!("Invalid tool input: {}", msg),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::UnsupportedFormat(fmt) => format!("Documents of type '{}' cannot be read.", fmt),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AgentError::AdapterUnavailable("down".into()).is_retryable());
        assert!(AgentError::RateLimited("429".into()).is_retryable());
        assert!(AgentError::AdapterTimeout(30).is_retryable());
        assert!(!AgentError::Auth("bad key".into()).is_retryable());
        assert!(!AgentError::Parse("bad block".into()).is_retryable());
        assert!(!AgentError::ToolNotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = AgentError::Adapter("candidate[0].content missing at byte 412".into());
        assert!(!err.user_message().contains("byte 412"));
    }
}
