//! Ollama text generator
//!
//! Talks to a local Ollama server (typically http://localhost:11434) through
//! its `/api/chat` endpoint. A response schema, when given, is passed as
//! Ollama's `format` field and the reply is parsed back into JSON.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{parse_structured, Generation, GenerationOptions, LLMError, Result, TextGenerator};

/// Ollama generator configuration
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    /// Base URL for Ollama API
    base_url: String,

    /// Model name (e.g., "llama3.1:8b")
    model: String,

    client: Client,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LLMError::ProviderUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            stream: false,
            format: options.response_schema.clone(),
            think: options.thinking_budget.map(|budget| budget > 0),
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation> {
        let request = self.build_request(system_prompt, user_prompt, options);

        tracing::debug!(
            model = %self.model,
            structured = options.response_schema.is_some(),
            prompt_chars = system_prompt.len() + user_prompt.len(),
            "Ollama request"
        );

        let url = format!("{}/api/chat", self.base_url);
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else if e.is_connect() {
                    LLMError::ProviderUnavailable(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.base_url
                    ))
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        tracing::info!(
            "Ollama response received in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LLMError::AuthenticationFailed(error_text)
                }
                StatusCode::TOO_MANY_REQUESTS => LLMError::QuotaExceeded,
                StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                    LLMError::InvalidRequest(error_text)
                }
                _ => LLMError::ProviderUnavailable(format!(
                    "Ollama API error ({}): {}",
                    status, error_text
                )),
            });
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("Failed to parse Ollama response: {}", e)))?;

        let content = body.message.content;
        if options.response_schema.is_some() {
            return parse_structured(&content)
                .map(Generation::Structured)
                .ok_or_else(|| LLMError::ParseError("expected JSON output".to_string()));
        }
        Ok(Generation::Text(content))
    }
}

/// Ollama API request format
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Ollama API response format
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}
