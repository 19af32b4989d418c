//! Reasoning provider adapter used by the grounding judge.
//!
//! The judge only needs "system instruction + user prompt in, text out".
//! [`LlmReasoningProvider`] narrows any [`LLMClient`] to that shape and pins
//! the generation settings an audit needs: zero temperature, JSON response
//! mode and a hard per-call timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

use super::client::LLMClient;
use super::types::{ChatMessage, CompletionRequest, TokenUsage};

/// Output of a single reasoning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Raw text returned by the provider (expected to be JSON)
    pub content: String,
    /// Token usage, when reported
    pub usage: Option<TokenUsage>,
}

impl Generation {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Capability interface the grounding judge depends on.
///
/// Implementations fail with [`Error::Provider`] on transport failure,
/// upstream error, timeout or empty content.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Generate a response for the given system instruction and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<Generation>;

    /// Short name used in logs and error messages.
    fn name(&self) -> &str;
}

/// [`ReasoningProvider`] backed by an [`LLMClient`].
pub struct LlmReasoningProvider {
    client: Arc<dyn LLMClient>,
    name: String,
    model: Option<String>,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmReasoningProvider {
    /// Default bound on a single provider call.
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        let name = client.provider().to_string();
        Self {
            client,
            name,
            model: None,
            max_tokens: 1024,
            timeout: Duration::from_millis(Self::DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str) -> CompletionRequest {
        let mut request = CompletionRequest::new()
            .with_system(system_prompt)
            .with_message(ChatMessage::user(user_prompt))
            .with_temperature(0.0)
            .with_max_tokens(self.max_tokens)
            .with_json_mode(true);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        request
    }
}

#[async_trait]
impl ReasoningProvider for LlmReasoningProvider {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<Generation> {
        let request = self.build_request(system_prompt, user_prompt);

        let response = tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .map_err(|_| {
                Error::provider(
                    &self.name,
                    format!("request timed out after {}ms", self.timeout.as_millis()),
                )
            })??;

        if response.content.trim().is_empty() {
            return Err(Error::provider(&self.name, "returned empty content"));
        }

        if let Some(usage) = &response.usage {
            debug!(
                provider = %self.name,
                model = %response.model,
                prompt_tokens = usage.input_tokens,
                completion_tokens = usage.output_tokens,
                total_tokens = usage.total(),
                "Reasoning provider usage"
            );
        }

        Ok(Generation {
            content: response.content,
            usage: response.usage,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
