//! Gemini Model Provider
//!
//! Implementation of `LlmProvider` for the hosted Gemini
//! `generateContent` endpoint. Retry and backoff live above this layer;
//! this adapter's job is the wire format and error classification.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key for the hosted endpoint
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs: 120,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| AgentError::Config("GEMINI_API_KEY must be set".into()))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

/// Gemini LLM provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("http client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    /// Convert agent messages to the Gemini wire format.
    ///
    /// System messages collapse into the system instruction; tool results
    /// travel as user-role context since the endpoint has no tool role.
    fn convert_messages(messages: &[Message]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system_text = String::new();
        let mut contents = Vec::new();

        for message in messages {
            match message.role {
                Role::System => {
                    if !system_text.is_empty() {
                        system_text.push_str("\n\n");
                    }
                    system_text.push_str(&message.content);
                }
                Role::User | Role::Tool => contents.push(GeminiContent {
                    role: Some("user".into()),
                    parts: vec![GeminiPart {
                        text: message.content.clone(),
                    }],
                }),
                Role::Assistant => contents.push(GeminiContent {
                    role: Some("model".into()),
                    parts: vec![GeminiPart {
                        text: message.content.clone(),
                    }],
                }),
            }
        }

        let system_instruction = if system_text.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system_text }],
            })
        };

        (system_instruction, contents)
    }

    fn classify_status(status: StatusCode, body: String) -> AgentError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(body),
            StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(body),
            s if s.is_server_error() => AgentError::AdapterUnavailable(body),
            s => AgentError::Adapter(format!("HTTP {}: {}", s, body)),
        }
    }

    fn convert_response(response: GeminiResponse, model: &str) -> Result<Completion> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Adapter("response contained no candidates".into()))?;

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let finish_reason = candidate.finish_reason.as_deref().map(|r| match r {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        });

        let usage = response.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            completion_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        });

        Ok(Completion {
            content,
            model: model.to_string(),
            usage,
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let (system_instruction, contents) = Self::convert_messages(messages);

        let request = GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                top_p: options.top_p,
                max_output_tokens: options.max_tokens,
                stop_sequences: options.stop_sequences.clone(),
            },
        };

        let response = self
            .client
            .post(self.endpoint(&options.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::AdapterTimeout(self.config.timeout_secs)
                } else if e.is_connect() {
                    AgentError::AdapterUnavailable(e.to_string())
                } else {
                    AgentError::Adapter(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Adapter(format!("malformed response body: {}", e)))?;

        Self::convert_response(body, &options.model)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!(
            "{}/models",
            self.config.base_url.trim_end_matches('/')
        );
        match self
            .client
            .get(url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = GeminiConfig::new("key");
        assert!(config.base_url.contains("generativelanguage"));
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_system_messages_fold_into_instruction() {
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Hello"),
        ];

        let (system, contents) = GeminiProvider::convert_messages(&messages);
        assert_eq!(system.unwrap().parts[0].text, "You are helpful.");
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
    }

    #[test]
    fn test_tool_messages_travel_as_user_context() {
        let messages = vec![
            Message::user("search x"),
            Message::assistant("requesting tool"),
            Message::tool("[Tool 'web_search' returned]\n...", "web_search", None, true),
        ];

        let (system, contents) = GeminiProvider::convert_messages(&messages);
        assert!(system.is_none());
        let roles: Vec<_> = contents.iter().filter_map(|c| c.role.as_deref()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            GeminiProvider::classify_status(StatusCode::UNAUTHORIZED, String::new()),
            AgentError::Auth(_)
        ));
        assert!(matches!(
            GeminiProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            AgentError::RateLimited(_)
        ));
        assert!(matches!(
            GeminiProvider::classify_status(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            AgentError::AdapterUnavailable(_)
        ));
        assert!(matches!(
            GeminiProvider::classify_status(StatusCode::BAD_REQUEST, String::new()),
            AgentError::Adapter(_)
        ));
    }

    #[test]
    fn test_response_conversion() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "hello "}, {"text": "there"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        }"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        let completion = GeminiProvider::convert_response(response, "gemini-2.5-pro").unwrap();

        assert_eq!(completion.content, "hello there");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_empty_candidates_is_adapter_error() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        let err = GeminiProvider::convert_response(response, "m").unwrap_err();
        assert!(matches!(err, AgentError::Adapter(_)));
    }
}
