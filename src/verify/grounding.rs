//! Grounding judge.
//!
//! Asks a reasoning provider whether every claim in an answer is supported
//! by the supplied context. The provider's reply is untrusted: it is parsed
//! and schema-checked, a failed attempt is retried, and once the attempts
//! run out the judge returns [`GroundingResult::technical_failure`] instead
//! of an error. Callers always get a well-formed result that fails toward
//! rejection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::llm::ReasoningProvider;

use super::schema::parse_judgment;
use super::types::GroundingResult;

const SYSTEM_PROMPT: &str = r#"You are an impartial auditor and fact-checker.
Your task is to verify if the 'AGENT ANSWER' is fully supported by the provided 'CONTEXT'.
You must be strict. Any claim in the answer that is not explicitly supported or directly inferable from the context is a hallucination.

Return your analysis in valid JSON format with the following structure:
{
  "pass": boolean, // true if fully grounded, false otherwise.
  "score": number, // 0.0 to 1.0 confidence score. 1.0 means perfectly grounded.
  "reason": "string", // A concise explanation of your decision.
  "unsupported_claims": ["string"] // List of specific sentences or claims from the answer that are not supported. Empty if pass is true.
}

Do not include any markdown formatting (like ```json) in your response, just the raw JSON string."#;

/// Retry and deadline settings for the judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Total provider attempts, including the first (minimum 1)
    pub max_attempts: u32,
    /// Optional deadline across all attempts, in milliseconds
    pub deadline_ms: Option<u64>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            deadline_ms: None,
        }
    }
}

impl JudgeConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }
}

/// Checks answers for claims the context does not support.
pub struct GroundingJudge {
    provider: Arc<dyn ReasoningProvider>,
    config: JudgeConfig,
}

impl GroundingJudge {
    pub fn new(provider: Arc<dyn ReasoningProvider>, config: JudgeConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// The auditor instruction sent as the system prompt.
    pub fn system_prompt() -> &'static str {
        SYSTEM_PROMPT
    }

    /// The user prompt embedding question, context and answer verbatim.
    pub fn user_prompt(question: &str, answer: &str, context: &str) -> String {
        format!(
            "\nUSER QUERY:\n\"{question}\"\n\nCONTEXT:\n\"\"\"\n{context}\n\"\"\"\n\nAGENT ANSWER:\n\"\"\"\n{answer}\n\"\"\"\n\nAnalyze the AGENT ANSWER against the CONTEXT."
        )
    }

    /// Judge whether `answer` is grounded in `context`.
    ///
    /// Never fails: exhausted attempts or an expired deadline produce the
    /// technical-failure result.
    #[instrument(skip_all, fields(provider = %self.provider.name()))]
    pub async fn verify_grounding(
        &self,
        question: &str,
        answer: &str,
        context: &str,
    ) -> GroundingResult {
        let user_prompt = Self::user_prompt(question, answer, context);
        debug!(
            prompt_bytes = user_prompt.len(),
            context_bytes = context.len(),
            "Built grounding prompt"
        );

        let attempts = self.call_with_retry(SYSTEM_PROMPT, &user_prompt);

        match self.config.deadline_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), attempts).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(deadline_ms = ms, "Grounding deadline exceeded");
                    GroundingResult::technical_failure(format!(
                        "grounding deadline of {}ms exceeded",
                        ms
                    ))
                }
            },
            None => attempts.await,
        }
    }

    async fn call_with_retry(&self, system_prompt: &str, user_prompt: &str) -> GroundingResult {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.call_judge(system_prompt, user_prompt).await {
                Ok(result) => {
                    debug!(attempt, pass = result.pass, score = result.score, "Judge responded");
                    return result;
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Judge attempt failed");
                    if attempt >= max_attempts || !e.is_retryable() {
                        return GroundingResult::technical_failure(e);
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn call_judge(&self, system_prompt: &str, user_prompt: &str) -> Result<GroundingResult> {
        let generation = self.provider.generate(system_prompt, user_prompt).await?;
        parse_judgment(&generation.content)
    }
}
