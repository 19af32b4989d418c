//! Audit trail for completed verifications.
//!
//! The verifier hands every finished verdict to an [`AuditSink`]. Writes are
//! detached from the verification itself: a sink that fails or stalls never
//! changes or delays the verdict returned to the caller.
//!
//! Two sinks are provided:
//! - [`TracingAuditSink`] emits each record as a structured `tracing` event
//! - [`SqliteAuditLog`] persists records and answers history/stats queries

mod schema;
mod store;
mod types;

pub use store::{SqliteAuditLog, DEFAULT_HISTORY_LIMIT};
pub use types::{AuditRecord, AuditStats, HistoryEntry};

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one record.
    async fn record(&self, record: AuditRecord) -> Result<()>;

    /// Sink name for logging.
    fn name(&self) -> &str;
}

/// Sink that logs each record at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        info!(
            target: "rag_audit::audit",
            request_id = %record.request_id,
            action = %record.action,
            trust_score = record.trust_score,
            duration_ms = record.duration_ms,
            grounded = record.result_details.grounding.pass,
            citations_ok = record.result_details.citation.pass,
            "Verification audited"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
