//! Audit trail for pipeline decisions.
//!
//! Every consequential transition (evaluation lifecycle, trust score,
//! alert activity) is recorded as a versioned JSON entry through an
//! [`AuditSink`]. The JSONL sink is the production path; the memory sink
//! backs tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use tw_common::Result;

use crate::store::JsonlWriter;

/// Audit schema version, bumped on breaking shape changes.
pub const AUDIT_SCHEMA_VERSION: &str = "1.0.0";

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    EvaluationStarted,
    EvaluationCompleted,
    EvaluationFailed,
    EvaluationSkipped,
    TrustScoreComputed,
    AlertCreated,
    AlertEscalated,
    AlertSuppressed,
    AlertResolved,
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    /// The evaluation or model key the event concerns.
    pub subject: String,
    /// Event-specific context (scores, error codes, alert ids).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(event: AuditEvent, subject: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        AuditEntry {
            schema_version: AUDIT_SCHEMA_VERSION.to_string(),
            timestamp,
            event,
            subject: subject.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Appends entries to a JSONL file.
pub struct JsonlAuditSink {
    writer: Mutex<JsonlWriter>,
}

impl JsonlAuditSink {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(JsonlAuditSink {
            writer: Mutex::new(JsonlWriter::open(path)?),
        })
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<()> {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        writer.append(&entry)
    }
}

/// Keeps entries in memory; test support.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<()> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(entry);
        Ok(())
    }
}

/// Sink that drops everything; for callers that opt out of auditing.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _entry: AuditEntry) -> Result<()> {
        Ok(())
    }
}
