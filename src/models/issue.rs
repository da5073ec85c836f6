//! # Issue Model
//!
//! A detected deviation from expected backend state, carrying its severity,
//! evidence, and remediation lifecycle. Issues are created by the rule
//! engine and mutated only by the remediation engine; their transition
//! history is append-only, so recurrence in a later scan produces a new
//! issue rather than reopening an old one.

use crate::connector::{ProbeResult, RemediationAction};
use crate::remediation::IssueState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Issue severity, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid severity: {s}")),
        }
    }
}

/// One recorded state transition on an issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTransition {
    pub from: IssueState,
    pub to: IssueState,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A detected problem on one backend target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub rule_id: String,
    pub severity: Severity,
    pub target_id: Uuid,
    /// Probe results that triggered the rule; stale with respect to any
    /// later verification probes
    pub evidence: Vec<ProbeResult>,
    pub action: Option<RemediationAction>,
    pub detected_at: DateTime<Utc>,
    pub state: IssueState,
    /// Number of remediation attempts dispatched so far
    pub attempts: u32,
    pub last_error: Option<String>,
    pub history: Vec<IssueTransition>,
}

impl Issue {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        target_id: Uuid,
        evidence: Vec<ProbeResult>,
        action: Option<RemediationAction>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule_id.into(),
            severity,
            target_id,
            evidence,
            action,
            detected_at: Utc::now(),
            state: IssueState::Detected,
            attempts: 0,
            last_error: None,
            history: Vec::new(),
        }
    }

    /// Record a state change in the append-only history
    pub fn record_transition(&mut self, to: IssueState, note: Option<String>) {
        self.history.push(IssueTransition {
            from: self.state,
            to,
            at: Utc::now(),
            note,
        });
        self.state = to;
    }

    /// Whether the issue's rule declares an automatic corrective action
    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }
}
