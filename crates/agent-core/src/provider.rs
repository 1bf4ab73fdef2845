//! Model Client Adapter Boundary
//!
//! Defines the interface the orchestration loop uses to talk to a hosted
//! LLM endpoint, plus the bounded-backoff retry policy applied to
//! transient adapter failures. The adapter is a black box: request is
//! the ordered conversation turns, response is raw text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::message::Message;

/// Configuration for model generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gemini-2.5-pro")
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_top_p() -> f32 {
    0.95
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-pro".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Response from a model completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated raw text
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if reported)
    pub usage: Option<TokenUsage>,

    /// Why generation stopped
    pub finish_reason: Option<FinishReason>,
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// Strategy trait for hosted model endpoints.
///
/// Implement this to add a new backend; the orchestration loop works
/// exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Generate a completion from the ordered conversation turns
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion>;

    /// Check if the provider is reachable and configured correctly
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Bounded exponential backoff for transient adapter failures
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Ceiling on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): base doubled per
    /// retry, capped at `max_delay`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Call the adapter, retrying transient failures with backoff.
///
/// Non-retryable errors escalate immediately; retryable ones escalate
/// only after the policy is exhausted. This is the system's single
/// source of externally-caused fatal failure.
pub async fn complete_with_backoff(
    provider: &dyn LlmProvider,
    messages: &[Message],
    options: &GenerationOptions,
    policy: &RetryPolicy,
    mut on_retry: impl FnMut(u32, &crate::error::AgentError),
) -> Result<Completion> {
    let mut attempt = 0u32;

    loop {
        match provider.complete(messages, options).await {
            Ok(completion) => return Ok(completion),
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    provider = provider.name(),
                    attempt = attempt + 1,
                    max = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "adapter call failed, retrying"
                );
                on_retry(attempt + 1, &err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.temperature, 0.7);
        assert_eq!(opts.max_tokens, 4096);
        assert!(opts.stop_sequences.is_empty());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
        assert_eq!(policy.delay_for(3), Duration::from_secs(10));
        assert_eq!(policy.delay_for(10), Duration::from_secs(10));
    }

    struct FlakyProvider {
        failures: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            options: &GenerationOptions,
        ) -> Result<Completion> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                return Err(AgentError::AdapterUnavailable("503".into()));
            }
            Ok(Completion {
                content: "ok".into(),
                model: options.model.clone(),
                usage: None,
                finish_reason: Some(FinishReason::Stop),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let provider = FlakyProvider {
            failures: AtomicU32::new(2),
        };
        let mut retries = 0;

        let completion = complete_with_backoff(
            &provider,
            &[],
            &GenerationOptions::default(),
            &RetryPolicy::default(),
            |_, _| retries += 1,
        )
        .await
        .unwrap();

        assert_eq!(completion.content, "ok");
        assert_eq!(retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_escalates() {
        let provider = FlakyProvider {
            failures: AtomicU32::new(10),
        };

        let err = complete_with_backoff(
            &provider,
            &[],
            &GenerationOptions::default(),
            &RetryPolicy::default(),
            |_, _| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AgentError::AdapterUnavailable(_)));
    }

    #[tokio::test]
    async fn test_non_retryable_escalates_immediately() {
        struct AuthFail;

        #[async_trait]
        impl LlmProvider for AuthFail {
            fn name(&self) -> &str {
                "authfail"
            }
            async fn complete(
                &self,
                _messages: &[Message],
                _options: &GenerationOptions,
            ) -> Result<Completion> {
                Err(AgentError::Auth("bad key".into()))
            }
        }

        let mut retries = 0;
        let err = complete_with_backoff(
            &AuthFail,
            &[],
            &GenerationOptions::default(),
            &RetryPolicy::default(),
            |_, _| retries += 1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AgentError::Auth(_)));
        assert_eq!(retries, 0);
    }
}
