//! Verifier configuration.
//!
//! Every setting has a default; [`VerifierConfig::from_env`] overrides them
//! from `RAG_AUDIT_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::llm::{LlmReasoningProvider, Provider};
use crate::verify::{CitationGrammar, JudgeConfig};

/// Deployment environment; controls whether error details reach callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Whether infrastructure failures may carry diagnostic detail.
    pub fn exposes_error_details(self) -> bool {
        self == Self::Development
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Configuration for a [`crate::Verifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Reasoning provider backing the grounding judge
    pub provider: Provider,
    /// Bound on a single provider call, in milliseconds
    pub attempt_timeout_ms: u64,
    /// Judge retry and deadline settings
    pub judge: JudgeConfig,
    /// Citation marker grammar version
    pub citation_grammar: CitationGrammar,
    /// Deployment environment
    pub environment: Environment,
    /// SQLite audit log location; audit records are only traced when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_db_path: Option<PathBuf>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAI,
            attempt_timeout_ms: LlmReasoningProvider::DEFAULT_TIMEOUT_MS,
            judge: JudgeConfig::default(),
            citation_grammar: CitationGrammar::default(),
            environment: Environment::default(),
            audit_db_path: None,
        }
    }
}

impl VerifierConfig {
    /// Load configuration from the environment.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `RAG_AUDIT_PROVIDER` | `openai` or `anthropic` |
    /// | `RAG_AUDIT_ATTEMPT_TIMEOUT_MS` | per-call provider timeout |
    /// | `RAG_AUDIT_MAX_ATTEMPTS` | judge attempts including the first |
    /// | `RAG_AUDIT_DEADLINE_MS` | deadline across all judge attempts |
    /// | `RAG_AUDIT_CITATION_GRAMMAR` | `v0` or `v1` |
    /// | `RAG_AUDIT_ENV` | `development` or `production` |
    /// | `RAG_AUDIT_DB_PATH` | SQLite audit log file |
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(provider) = env_parse("RAG_AUDIT_PROVIDER")? {
            config.provider = provider;
        }
        if let Some(ms) = env_parse("RAG_AUDIT_ATTEMPT_TIMEOUT_MS")? {
            config.attempt_timeout_ms = ms;
        }
        if let Some(attempts) = env_parse::<u32>("RAG_AUDIT_MAX_ATTEMPTS")? {
            if attempts == 0 {
                return Err(Error::config("RAG_AUDIT_MAX_ATTEMPTS must be at least 1"));
            }
            config.judge = config.judge.with_max_attempts(attempts);
        }
        if let Some(ms) = env_parse("RAG_AUDIT_DEADLINE_MS")? {
            config.judge = config.judge.with_deadline_ms(ms);
        }
        if let Some(grammar) = env_parse("RAG_AUDIT_CITATION_GRAMMAR")? {
            config.citation_grammar = grammar;
        }
        if let Some(environment) = env_parse("RAG_AUDIT_ENV")? {
            config.environment = environment;
        }
        config.audit_db_path = std::env::var_os("RAG_AUDIT_DB_PATH").map(PathBuf::from);

        Ok(config)
    }

    pub fn with_judge(mut self, judge: JudgeConfig) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_citation_grammar(mut self, grammar: CitationGrammar) -> Self {
        self.citation_grammar = grammar;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

/// Parse an optional environment variable.
///
/// Unset or blank variables yield `None`; unparsable values are a
/// configuration error naming the variable.
pub(crate) fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(format!("invalid {}='{}': {}", key, raw, e))),
        _ => Ok(None),
    }
}
