//! # Scan Run Model
//!
//! One execution of the orchestrator across a set of backend targets.
//! A run is mutable while it is being driven and immutable once finished;
//! the next run for the same target set supersedes it rather than merging.

use crate::connector::BackendKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Completion status of a scan run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// The run is still dispatching or collecting units
    Running,
    /// Every target produced a result set
    Complete,
    /// At least one target failed, was deferred past the budget, or the
    /// global scan timeout forced completion
    Partial,
    /// The run was cancelled before all targets were dispatched
    Cancelled,
}

impl ScanStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Partial => write!(f, "partial"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Typed reason a target failed to produce a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Could not establish or keep a connection
    Connection,
    /// Probe exceeded its timeout
    ProbeTimeout,
    /// Probe failed for a non-timeout reason
    Probe,
    /// No pool slot became free within the deferred-pass budget
    PoolExhausted,
    /// The run was cancelled before this target was dispatched
    Cancelled,
    /// The global scan timeout elapsed before this target finished
    ScanTimeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::ProbeTimeout => write!(f, "probe_timeout"),
            Self::Probe => write!(f, "probe"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ScanTimeout => write!(f, "scan_timeout"),
        }
    }
}

/// Partial-failure entry: one target that yielded no result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFailure {
    pub target_id: Uuid,
    pub kind: BackendKind,
    pub failure: FailureKind,
    pub message: String,
}

/// Outcome for one target within a run. Every dispatched target yields
/// exactly one of these; silent omission is a defect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
    Completed {
        target_id: Uuid,
        kind: BackendKind,
        issue_ids: Vec<Uuid>,
        probes_succeeded: usize,
        probes_failed: usize,
    },
    Failed(TargetFailure),
}

impl TargetOutcome {
    pub fn target_id(&self) -> Uuid {
        match self {
            Self::Completed { target_id, .. } => *target_id,
            Self::Failed(failure) => failure.target_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One complete probing-and-evaluation cycle over a target set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: ScanStatus,
    pub targets_total: usize,
    pub outcomes: Vec<TargetOutcome>,
    /// Number of deferred passes the run needed for pool-contended targets
    pub deferred_passes: u32,
}

impl ScanRun {
    pub fn new(targets_total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            status: ScanStatus::Running,
            targets_total,
            outcomes: Vec::new(),
            deferred_passes: 0,
        }
    }

    pub fn record_outcome(&mut self, outcome: TargetOutcome) {
        self.outcomes.push(outcome);
    }

    /// Seal the run. The status is derived from the recorded outcomes
    /// unless an overriding status (cancelled, timeout-forced partial) is
    /// supplied by the orchestrator.
    pub fn finish(&mut self, status_override: Option<ScanStatus>) {
        let derived = if self.outcomes.iter().any(TargetOutcome::is_failure)
            || self.outcomes.len() < self.targets_total
        {
            ScanStatus::Partial
        } else {
            ScanStatus::Complete
        };
        self.status = status_override.unwrap_or(derived);
        self.finished_at = Some(Utc::now());
    }

    pub fn issue_ids(&self) -> Vec<Uuid> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                TargetOutcome::Completed { issue_ids, .. } => Some(issue_ids.iter().copied()),
                TargetOutcome::Failed(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn failures(&self) -> Vec<&TargetFailure> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                TargetOutcome::Failed(failure) => Some(failure),
                TargetOutcome::Completed { .. } => None,
            })
            .collect()
    }
}
