use serde::{Deserialize, Serialize};

/// Events that can trigger issue state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IssueEvent {
    /// Dispatch the issue's remediation action
    StartRemediation,
    /// A fresh verification probe confirmed the rule condition cleared
    VerificationConfirmed,
    /// The retry budget ran out with the condition still present
    RemediationExhausted(String),
    /// An operator marked the issue handled
    Acknowledge,
}

impl IssueEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StartRemediation => "start_remediation",
            Self::VerificationConfirmed => "verification_confirmed",
            Self::RemediationExhausted(_) => "remediation_exhausted",
            Self::Acknowledge => "acknowledge",
        }
    }

    /// Extract the failure reason if this is an exhaustion event
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::RemediationExhausted(reason) => Some(reason),
            _ => None,
        }
    }

    /// Check if this event ends automated processing of the issue
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::VerificationConfirmed | Self::RemediationExhausted(_) | Self::Acknowledge
        )
    }

    /// Create an exhaustion event with the given reason
    pub fn exhausted(reason: impl Into<String>) -> Self {
        Self::RemediationExhausted(reason.into())
    }
}
