//! # Event Publisher
//!
//! Broadcast channel carrying typed lifecycle events to whoever is
//! listening (dashboard push, notification pipeline). Publishing with zero
//! subscribers is acceptable and silently drops the event.

use crate::models::{ScanStatus, Severity};
use crate::remediation::IssueState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Typed lifecycle events emitted by the diagnostic core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    ScanStarted {
        scan_id: Uuid,
        target_count: usize,
        started_at: DateTime<Utc>,
    },
    ScanCompleted {
        scan_id: Uuid,
        status: ScanStatus,
        issue_count: usize,
        completed_at: DateTime<Utc>,
    },
    TargetCompleted {
        scan_id: Uuid,
        target_id: Uuid,
        issue_count: usize,
    },
    TargetFailed {
        scan_id: Uuid,
        target_id: Uuid,
        reason: String,
    },
    IssueDetected {
        issue_id: Uuid,
        rule_id: String,
        severity: Severity,
        target_id: Uuid,
        detected_at: DateTime<Utc>,
    },
    RemediationStarted {
        issue_id: Uuid,
        action: String,
        attempt: u32,
    },
    IssueResolved {
        issue_id: Uuid,
        attempts: u32,
    },
    RemediationFailed {
        issue_id: Uuid,
        attempts: u32,
        reason: String,
    },
    IssueAcknowledged {
        issue_id: Uuid,
        final_state: IssueState,
    },
}

impl DiagnosticEvent {
    /// String tag of the event for logging and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ScanStarted { .. } => "scan_started",
            Self::ScanCompleted { .. } => "scan_completed",
            Self::TargetCompleted { .. } => "target_completed",
            Self::TargetFailed { .. } => "target_failed",
            Self::IssueDetected { .. } => "issue_detected",
            Self::RemediationStarted { .. } => "remediation_started",
            Self::IssueResolved { .. } => "issue_resolved",
            Self::RemediationFailed { .. } => "remediation_failed",
            Self::IssueAcknowledged { .. } => "issue_acknowledged",
        }
    }
}

/// High-throughput publisher for diagnostic lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<DiagnosticEvent>,
}

impl EventPublisher {
    /// Create a new publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning the number of subscribers that will see
    /// it. Zero subscribers is not an error.
    pub fn publish(&self, event: DiagnosticEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(_)) => 0,
        }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
