//! Deterministic generator for tests and offline runs

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{Generation, GenerationOptions, LLMError, Result, TextGenerator};

/// Replays queued responses in order, then repeats the fallback.
pub struct ScriptedGenerator {
    queue: Mutex<VecDeque<Result<Generation>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Always answers with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(text.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with the given quota error.
    pub fn failing() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(self, response: Result<Generation>) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
        self
    }

    /// User prompts seen so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Generation> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(user_prompt.to_string());

        if let Some(next) = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            return next;
        }
        match &self.fallback {
            Some(text) => Ok(Generation::Text(text.clone())),
            None => Err(LLMError::QuotaExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queue_then_fallback() {
        let generator = ScriptedGenerator::always("fallback")
            .push(Ok(Generation::Text("first".into())));
        let opts = GenerationOptions::default();

        assert_eq!(
            generator.generate("s", "a", &opts).await.unwrap().into_text(),
            "first"
        );
        assert_eq!(
            generator.generate("s", "b", &opts).await.unwrap().into_text(),
            "fallback"
        );
        assert_eq!(generator.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failing_generator_reports_quota() {
        let generator = ScriptedGenerator::failing();
        let err = generator
            .generate("s", "u", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::QuotaExceeded));
    }
}
