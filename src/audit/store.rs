//! SQLite-backed audit log.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::audit::schema::{initialize_schema, is_initialized};
use crate::audit::types::{AuditRecord, AuditStats, HistoryEntry};
use crate::audit::AuditSink;
use crate::error::{Error, Result};
use crate::verify::{round2, Action};

/// Number of rows returned by [`SqliteAuditLog::recent`].
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Persistent audit log.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct SqliteAuditLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuditLog {
    /// Open or create an audit log at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::AuditLog(e.to_string()))?;

        if !is_initialized(&conn) {
            initialize_schema(&conn).map_err(|e| Error::AuditLog(e.to_string()))?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory audit log (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::AuditLog(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::AuditLog(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::AuditLog(format!("Failed to lock connection: {}", e)))?;
        f(&conn).map_err(|e| Error::AuditLog(e.to_string()))
    }

    /// Append a record.
    pub fn insert(&self, record: &AuditRecord) -> Result<()> {
        let details = serde_json::to_string(&record.result_details)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_log (
                    id, timestamp, duration_ms, question, answer, action, trust_score, result_details
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.request_id.to_string(),
                    record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                    record.duration_ms as i64,
                    record.question,
                    record.answer,
                    record.action.as_str(),
                    record.trust_score,
                    details,
                ],
            )?;
            Ok(())
        })?;

        debug!(request_id = %record.request_id, "Audit record stored");
        Ok(())
    }

    /// Fetch a full record by request ID.
    pub fn get(&self, request_id: &Uuid) -> Result<Option<AuditRecord>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, timestamp, duration_ms, question, answer, action, trust_score, result_details
                 FROM audit_log WHERE id = ?1",
                params![request_id.to_string()],
                |row| {
                    Ok(RawRecordRow {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        duration_ms: row.get(2)?,
                        question: row.get(3)?,
                        answer: row.get(4)?,
                        action: row.get(5)?,
                        trust_score: row.get(6)?,
                        result_details: row.get(7)?,
                    })
                },
            )
            .optional()
        })?;

        row.map(RawRecordRow::into_record).transpose()
    }

    /// The most recent `limit` records, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, question, action, trust_score, duration_ms
                 FROM audit_log ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], raw_history_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        rows.into_iter().map(RawHistoryRow::into_entry).collect()
    }

    /// The most recent [`DEFAULT_HISTORY_LIMIT`] records, newest first.
    pub fn recent(&self) -> Result<Vec<HistoryEntry>> {
        self.history(DEFAULT_HISTORY_LIMIT)
    }

    /// Aggregate statistics over every stored record.
    pub fn stats(&self) -> Result<AuditStats> {
        let (total, average, rejected) = self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*), AVG(trust_score),
                        COALESCE(SUM(CASE WHEN action = 'REJECT' THEN 1 ELSE 0 END), 0)
                 FROM audit_log",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
        })?;

        if total == 0 {
            return Ok(AuditStats::empty());
        }

        Ok(AuditStats {
            total_requests: total as u64,
            average_trust_score: round2(average.unwrap_or(0.0)),
            rejection_rate: round2(rejected as f64 / total as f64 * 100.0),
        })
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .map(|n| n as u64)
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        let log = self.clone();
        tokio::task::spawn_blocking(move || log.insert(&record))
            .await
            .map_err(|e| Error::AuditLog(format!("audit write task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

struct RawRecordRow {
    id: String,
    timestamp: String,
    duration_ms: i64,
    question: String,
    answer: String,
    action: String,
    trust_score: f64,
    result_details: String,
}

impl RawRecordRow {
    fn into_record(self) -> Result<AuditRecord> {
        Ok(AuditRecord {
            request_id: parse_uuid(&self.id)?,
            timestamp: parse_timestamp(&self.timestamp)?,
            duration_ms: self.duration_ms.max(0) as u64,
            question: self.question,
            answer: self.answer,
            action: parse_action(&self.action)?,
            trust_score: self.trust_score,
            result_details: serde_json::from_str(&self.result_details)?,
        })
    }
}

struct RawHistoryRow {
    id: String,
    timestamp: String,
    question: String,
    action: String,
    trust_score: f64,
    duration_ms: i64,
}

impl RawHistoryRow {
    fn into_entry(self) -> Result<HistoryEntry> {
        Ok(HistoryEntry {
            request_id: parse_uuid(&self.id)?,
            timestamp: parse_timestamp(&self.timestamp)?,
            question: self.question,
            action: parse_action(&self.action)?,
            trust_score: self.trust_score,
            duration_ms: self.duration_ms.max(0) as u64,
        })
    }
}

fn raw_history_row(row: &Row<'_>) -> rusqlite::Result<RawHistoryRow> {
    Ok(RawHistoryRow {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        question: row.get(2)?,
        action: row.get(3)?,
        trust_score: row.get(4)?,
        duration_ms: row.get(5)?,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::AuditLog(format!("bad request id '{}': {}", s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::AuditLog(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_action(s: &str) -> Result<Action> {
    s.parse().map_err(Error::AuditLog)
}
