//! Trust scoring and the approve/reject decision.
//!
//! Grounding dominates: a grounded answer scores
//! `0.8 * grounding + 0.2 * citation`, while an ungrounded one is capped at
//! 0.4 so that good citations can never lift a hallucinated answer over the
//! approval threshold.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::types::{round2, Action, CitationResult, GroundingResult, APPROVAL_THRESHOLD};

/// Weight of the grounding score for grounded answers.
pub const GROUNDING_WEIGHT: f64 = 0.8;

/// Weight of the citation score for grounded answers.
pub const CITATION_WEIGHT: f64 = 0.2;

/// Ceiling applied when grounding fails.
pub const UNGROUNDED_CAP: f64 = 0.4;

/// Score, action and suggestion derived from the two check results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustDecision {
    /// Combined score rounded to two decimals
    pub trust_score: f64,
    /// Decision taken on the rounded score
    pub action: Action,
    /// Present exactly when `action` is reject
    pub retry_suggestion: Option<String>,
}

/// Combine grounding and citation results into a decision.
///
/// Fails only when a score is not a finite number, which indicates a bug
/// upstream rather than a negative judgment.
pub fn score(grounding: &GroundingResult, citation: &CitationResult) -> Result<TrustDecision> {
    if !grounding.score.is_finite() || !citation.score.is_finite() {
        return Err(Error::infrastructure(format!(
            "non-finite check score (grounding={}, citation={})",
            grounding.score, citation.score
        )));
    }

    let raw = if grounding.pass {
        grounding.score * GROUNDING_WEIGHT + citation.score * CITATION_WEIGHT
    } else {
        grounding.score.min(UNGROUNDED_CAP)
    };
    let trust_score = round2(raw.clamp(0.0, 1.0));

    // Threshold on the rounded value so the published score and action agree.
    let action = if trust_score >= APPROVAL_THRESHOLD {
        Action::Approve
    } else {
        Action::Reject
    };

    let retry_suggestion = match action {
        Action::Approve => None,
        Action::Reject => Some(retry_suggestion(grounding, citation)),
    };

    Ok(TrustDecision {
        trust_score,
        action,
        retry_suggestion,
    })
}

/// Build revision guidance from whichever checks failed.
///
/// With no failed check the body is empty and only the trailer remains.
pub fn retry_suggestion(grounding: &GroundingResult, citation: &CitationResult) -> String {
    let mut parts = Vec::new();
    if !grounding.pass {
        parts.push(format!(
            "Unsupported claims: {}",
            grounding.unsupported_claims.join(", ")
        ));
    }
    if !citation.pass {
        parts.push(format!(
            "Invalid citations: {}",
            citation.missing_sources.join(", ")
        ));
    }
    format!("{}. Please revise.", parts.join(". "))
}
