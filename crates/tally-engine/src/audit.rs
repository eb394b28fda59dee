//! # Audit Seam
//!
//! The obligation to emit one audit event per mutating operation.
//!
//! ## Why a Trait?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Audit Boundary                                    │
//! │                                                                         │
//! │  Engine service (process_sale, manual_correction, ...)                 │
//! │       │                                                                 │
//! │       │  sink.record(AuditEvent { ... })                               │
//! │       ▼                                                                 │
//! │  AuditSink (trait) ← THIS IS THE SYSTEM BOUNDARY                       │
//! │       │                                                                 │
//! │       ├── TracingAuditSink  → structured log line (default)            │
//! │       ├── RecordingAuditSink → in-memory Vec (tests, diagnostics)      │
//! │       └── <external>        → whatever store the audit collaborator    │
//! │                               provides                                  │
//! │                                                                         │
//! │  Storage mechanics are the collaborator's problem; the engine only     │
//! │  guarantees that every mutation emits exactly one event.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use tracing::info;

use tally_core::ActingUser;

// =============================================================================
// Audit Event
// =============================================================================

/// What kind of mutation happened.
///
/// `ManualCorrection` is deliberately distinct from `Update`: a manual
/// opening-stock overwrite can mask upstream drift and must be easy to
/// find in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    ManualCorrection,
}

/// One audit event per mutating operation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,

    /// Logical table/entity name, e.g. "product", "sale_event".
    pub entity: String,

    /// Surrogate id of the affected record.
    pub record_id: String,

    /// Entity state before the mutation (absent for creates).
    pub old_values: Option<Value>,

    /// Entity state after the mutation (absent for deletes).
    pub new_values: Option<Value>,

    /// Human-readable one-liner for log review.
    pub summary: String,

    /// Who performed the operation.
    pub user_id: String,

    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates an event with the required fields; before/after values are
    /// attached with the `with_*` builders.
    pub fn new(
        action: AuditAction,
        entity: impl Into<String>,
        record_id: impl Into<String>,
        user: &ActingUser,
        summary: impl Into<String>,
    ) -> Self {
        AuditEvent {
            action,
            entity: entity.into(),
            record_id: record_id.into(),
            old_values: None,
            new_values: None,
            summary: summary.into(),
            user_id: user.id.clone(),
            occurred_at: Utc::now(),
        }
    }

    /// Attaches the pre-mutation state.
    pub fn with_old<T: Serialize>(mut self, old: &T) -> Self {
        self.old_values = serde_json::to_value(old).ok();
        self
    }

    /// Attaches the post-mutation state.
    pub fn with_new<T: Serialize>(mut self, new: &T) -> Self {
        self.new_values = serde_json::to_value(new).ok();
        self
    }
}

// =============================================================================
// Audit Sink
// =============================================================================

/// Receiver for audit events.
///
/// Implementations must be cheap and non-blocking: the engine calls
/// `record` inside its critical sections.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: one structured log line per event.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            action = ?event.action,
            entity = %event.entity,
            record_id = %event.record_id,
            user_id = %event.user_id,
            "{}",
            event.summary
        );
    }
}

/// Sink that accumulates events in memory.
///
/// Used by tests to assert on emitted events; also handy as a diagnostic
/// tap in front of a real sink.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        RecordingAuditSink::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit event buffer poisoned").clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().expect("audit event buffer poisoned").push(event);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
