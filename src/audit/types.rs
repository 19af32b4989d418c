//! Audit log record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::verify::{Action, TestResults, Verdict, VerificationRequest};

/// One completed verification, as written to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Identifier assigned when the verification started
    pub request_id: Uuid,
    /// Completion time
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the verification
    pub duration_ms: u64,
    pub question: String,
    pub answer: String,
    pub action: Action,
    pub trust_score: f64,
    /// Check results exactly as returned to the caller
    pub result_details: TestResults,
}

impl AuditRecord {
    /// Build a record from a finished verification.
    pub fn new(
        request_id: Uuid,
        request: &VerificationRequest,
        verdict: &Verdict,
        duration_ms: u64,
    ) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            duration_ms,
            question: request.question.clone(),
            answer: request.answer.clone(),
            action: verdict.action,
            trust_score: verdict.trust_score,
            result_details: verdict.tests.clone(),
        }
    }
}

/// Summary row returned by history queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub action: Action,
    pub trust_score: f64,
    pub duration_ms: u64,
}

/// Aggregate statistics over the whole audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_requests: u64,
    /// Mean trust score, rounded to two decimals (0.0 when empty)
    pub average_trust_score: f64,
    /// Share of rejected answers in percent, rounded to two decimals
    pub rejection_rate: f64,
}

impl AuditStats {
    pub fn empty() -> Self {
        Self {
            total_requests: 0,
            average_trust_score: 0.0,
            rejection_rate: 0.0,
        }
    }
}
