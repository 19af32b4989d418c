//! Core types for answer verification.
//!
//! Every value here is built once per verification call and never mutated
//! afterwards. The serialized shape of [`Verdict`] is the wire contract
//! exposed to request-routing collaborators.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator used when joining context passages into one prompt string.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Trust score at or above which an answer is approved.
pub const APPROVAL_THRESHOLD: f64 = 0.70;

/// Input to a single verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// The user question the answer responds to
    pub question: String,
    /// The generated answer under audit
    pub answer: String,
    /// Supporting passages, in retrieval order
    #[serde(default)]
    pub context: Vec<String>,
}

impl VerificationRequest {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            context: Vec::new(),
        }
    }

    /// Append a context passage.
    pub fn with_passage(mut self, passage: impl Into<String>) -> Self {
        self.context.push(passage.into());
        self
    }

    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }

    /// Context passages joined with blank lines; empty when none were given.
    pub fn joined_context(&self) -> String {
        self.context.join(CONTEXT_SEPARATOR)
    }

    /// Router-side input check: question and answer must be non-empty.
    ///
    /// [`crate::Verifier::verify`] does not call this; rejecting malformed
    /// input is the caller's job.
    pub fn validate(&self) -> Result<()> {
        if self.question.is_empty() {
            return Err(Error::InvalidRequest(
                "question must be at least 1 character".to_string(),
            ));
        }
        if self.answer.is_empty() {
            return Err(Error::InvalidRequest(
                "answer must be at least 1 character".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of the grounding judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingResult {
    /// True if every claim is supported by the context
    pub pass: bool,
    /// Judge confidence that the answer is grounded (0.0 - 1.0)
    pub score: f64,
    /// Short explanation of the decision
    pub reason: String,
    /// Claims from the answer the context does not support
    pub unsupported_claims: Vec<String>,
}

impl GroundingResult {
    /// Claim recorded when the judge could not produce a verdict.
    pub const SYSTEM_ERROR_CLAIM: &'static str = "System Error: Unable to verify content.";

    /// The fail-closed result returned once every judge attempt has failed.
    pub fn technical_failure(cause: impl std::fmt::Display) -> Self {
        Self {
            pass: false,
            score: 0.0,
            reason: format!("Audit failed due to technical error: {}", cause),
            unsupported_claims: vec![Self::SYSTEM_ERROR_CLAIM.to_string()],
        }
    }
}

/// Outcome of the citation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationResult {
    /// True if every cited source resolves in the context
    pub pass: bool,
    /// Fraction of distinct citations that resolve (1.0 when none cited)
    pub score: f64,
    /// Cited IDs missing from the context, in first-seen order
    pub missing_sources: Vec<String>,
}

impl CitationResult {
    /// Result for an answer that cites nothing.
    pub fn uncited() -> Self {
        Self {
            pass: true,
            score: 1.0,
            missing_sources: Vec::new(),
        }
    }
}

/// Gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Approve,
    Reject,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "APPROVE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// The individual check results carried inside a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    pub grounding: GroundingResult,
    pub citation: CitationResult,
}

/// Final result of one verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Combined score, rounded to two decimals
    pub trust_score: f64,
    /// Approve or reject
    pub action: Action,
    /// Individual check results (scores rounded to two decimals)
    pub tests: TestResults,
    /// Revision guidance; present exactly when the answer is rejected
    pub retry_suggestion: Option<String>,
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        self.action == Action::Approve
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
