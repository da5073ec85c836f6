//! # Error Types
//!
//! Structured error handling for the diagnostic core using thiserror
//! for typed error variants instead of `Box<dyn Error>` patterns.
//!
//! The taxonomy mirrors how failures travel through the system:
//! connection and probe failures stay local to the unit that hit them and
//! are converted into typed scan outcomes, pool exhaustion defers the
//! target, action errors drive the remediation state machine, and rule
//! evaluation failures are scoped to a single rule.

use std::time::Duration;
use thiserror::Error;

/// Comprehensive error types for the diagnostic core
#[derive(Error, Debug)]
pub enum SentinelError {
    /// Transient connection failure against a backend; retryable, feeds the
    /// pool's degradation tracking.
    #[error("Connection error for target {target}: {message}")]
    Connection { target: String, message: String },

    #[error("Probe '{probe}' timed out against target {target} after {timeout:?}")]
    ProbeTimeout {
        probe: String,
        target: String,
        timeout: Duration,
    },

    #[error("Probe '{probe}' failed against target {target}: {message}")]
    Probe {
        probe: String,
        target: String,
        message: String,
    },

    #[error("Remediation action '{action}' failed against target {target}: {message}")]
    Action {
        action: String,
        target: String,
        message: String,
    },

    /// No connection slot became free within the acquire timeout. Surfaced
    /// to the orchestrator as a deferred-target condition.
    #[error("Connection pool exhausted for backend kind {kind}: waited {waited_ms}ms")]
    PoolExhausted { kind: String, waited_ms: u64 },

    /// Fatal to a single rule's evaluation only; other rules still run.
    #[error("Rule '{rule_id}' evaluation failed: {message}")]
    RuleEvaluation { rule_id: String, message: String },

    #[error("Invalid state transition from {from} via {event}")]
    StateTransition { from: String, event: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Authentication failed for target {target}: {message}")]
    Authentication { target: String, message: String },

    #[error("Scan {scan_id} not found")]
    ScanNotFound { scan_id: String },

    #[error("Issue {issue_id} not found")]
    IssueNotFound { issue_id: String },

    #[error("Target {target_id} not registered")]
    TargetNotFound { target_id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SentinelError {
    /// Create a connection error
    pub fn connection(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a probe timeout error
    pub fn probe_timeout(
        probe: impl Into<String>,
        target: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::ProbeTimeout {
            probe: probe.into(),
            target: target.into(),
            timeout,
        }
    }

    /// Create a probe error
    pub fn probe(
        probe: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Probe {
            probe: probe.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create an action error
    pub fn action(
        action: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Action {
            action: action.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a rule evaluation error
    pub fn rule_evaluation(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleEvaluation {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error is transient and worth retrying against the same
    /// backend (connection failures and pool contention; auth failures and
    /// configuration problems are not).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ProbeTimeout { .. }
                | Self::PoolExhausted { .. }
                | Self::Action { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
