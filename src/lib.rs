//! # rag-audit
//!
//! Post-generation audit for retrieval-augmented answers. Given a question,
//! a generated answer and the retrieved context, it decides whether the
//! answer is safe to show.
//!
//! ## Core Components
//!
//! - **Verify**: Citation checker, grounding judge and trust scoring
//! - **Orchestrator**: [`Verifier`], the async entry point tying them together
//! - **LLM**: Provider clients and the [`ReasoningProvider`] adapter used by the judge
//! - **Audit**: Sinks that record every verdict, including a SQLite log
//!
//! ## Example
//!
//! ```rust,ignore
//! use rag_audit::{Verifier, VerificationRequest};
//!
//! let verifier = Verifier::from_env()?;
//!
//! let request = VerificationRequest::new("When did it open?", "It opened in 2001 [doc1].")
//!     .with_passage("doc1: The museum opened in 2001.");
//!
//! match verifier.verify(&request).await {
//!     Ok(verdict) if verdict.is_approved() => println!("approved: {}", verdict.trust_score),
//!     Ok(verdict) => println!("rejected: {:?}", verdict.retry_suggestion),
//!     Err(e) => eprintln!("{:?}", verifier.failure_response(&e)),
//! }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod verify;

// Re-exports for convenience
pub use audit::{AuditRecord, AuditSink, AuditStats, HistoryEntry, SqliteAuditLog, TracingAuditSink};
pub use config::{Environment, VerifierConfig};
pub use error::{Error, Result};
pub use llm::{
    AnthropicClient, ClientConfig, Generation, LLMClient, LlmReasoningProvider, OpenAIClient,
    Provider, ReasoningProvider,
};
pub use orchestrator::{FailureResponse, Verifier, VerifierBuilder};
pub use verify::{
    Action, CitationChecker, CitationGrammar, CitationResult, GroundingJudge, GroundingResult,
    JudgeConfig, SchemaViolation, TestResults, Verdict, VerificationRequest,
};
