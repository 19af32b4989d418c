//! Answer verification: citation checking, grounding judgment and trust
//! scoring.
//!
//! An answer is audited along two independent axes:
//!
//! 1. **Citations**: every in-text marker such as `[doc1]` or `(src-2)` must
//!    resolve to something in the supplied context. Pure and deterministic.
//! 2. **Grounding**: a reasoning provider judges whether each claim is
//!    supported by the context. The provider's reply is untrusted text; it
//!    is schema-checked and retried, and the judge fails closed.
//!
//! [`scoring::score`] combines both into a trust score in `[0, 1]`. Answers
//! scoring at least [`APPROVAL_THRESHOLD`] are approved; grounding failures
//! are capped well below the threshold regardless of citations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rag_audit::verify::{CitationChecker, CitationGrammar};
//!
//! let checker = CitationChecker::new(CitationGrammar::V1)?;
//! let result = checker.verify_citations("See [doc1] and (src2).", "doc1 confirms the fact.");
//! assert_eq!(result.missing_sources, vec!["src2"]);
//! ```

pub mod citation;
pub mod grounding;
#[cfg(test)]
mod proptest;
pub mod schema;
pub mod scoring;
pub mod types;

pub use citation::{CitationChecker, CitationGrammar};
pub use grounding::{GroundingJudge, JudgeConfig};
pub use schema::{parse_judgment, strip_code_fences, validate_judgment, SchemaViolation};
pub use scoring::{score, TrustDecision};
pub use types::{
    round2, Action, CitationResult, GroundingResult, TestResults, Verdict, VerificationRequest,
    APPROVAL_THRESHOLD, CONTEXT_SEPARATOR,
};
