//! Text-generation backend
//!
//! Workers see the model server only through [`TextGenerator`]: a system
//! prompt, a user prompt and options in; plain text or structured JSON out.
//! Every backend failure surfaces as [`LLMError`], which converts into
//! `SquadError::Generation` so callers can tell it apart from other errors.

use async_trait::async_trait;
use sdk::errors::SquadError;
use serde::{Deserialize, Serialize};

pub mod ollama;
pub mod scripted;

/// Result type for generation calls
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while generating text
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Quota exceeded")]
    QuotaExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for SquadError {
    fn from(err: LLMError) -> Self {
        SquadError::Generation(err.to_string())
    }
}

/// Per-call generation options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Reasoning token budget; backends without reasoning ignore it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,

    /// When set, the backend must return JSON matching this schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

impl GenerationOptions {
    pub fn structured(schema: serde_json::Value) -> Self {
        Self {
            response_schema: Some(schema),
            ..Default::default()
        }
    }
}

/// What a backend produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Generation {
    Text(String),
    Structured(serde_json::Value),
}

impl Generation {
    /// Renders the output as text; structured output is compact JSON.
    pub fn into_text(self) -> String {
        match self {
            Generation::Text(text) => text,
            Generation::Structured(value) => value.to_string(),
        }
    }
}

/// Contract every text-generation backend implements
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Generate a response for the given prompts.
    ///
    /// Implementations return `Generation::Structured` when
    /// `options.response_schema` is set and the output parses as JSON.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation>;
}

/// Pulls a JSON value out of model output.
///
/// Accepts raw JSON, a fenced code block (with trailing prose), or the first
/// balanced object embedded in prose.
pub fn parse_structured(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Ok(value) = serde_json::from_str(inner.trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let candidate = extract_balanced_json(&trimmed[start..])?;
    serde_json::from_str(candidate).ok()
}

/// Body of the first markdown code fence, skipping the language tag line.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    let body_start = fence_start + 3 + after_opening.find('\n')? + 1;
    let body_end = body_start + content[body_start..].find("```")?;

    if body_start >= body_end {
        return None;
    }
    Some(&content[body_start..body_end])
}

/// Balanced `{...}` prefix of `s`, respecting string literals.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
