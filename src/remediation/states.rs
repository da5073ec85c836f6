use serde::{Deserialize, Serialize};
use std::fmt;

/// Remediation lifecycle states for a detected issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    /// Issue created by the rule engine, no action attempted yet
    Detected,
    /// A remediation action has been dispatched; awaiting its outcome
    ActionPending,
    /// A post-action verification probe confirmed the condition cleared
    Resolved,
    /// The action failed after the retry budget, or verification still
    /// showed the issue after a successful action
    Failed,
    /// An operator marked the issue handled without further automation
    Acknowledged,
}

impl IssueState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }

    /// Check if automated remediation is still in flight
    pub fn is_active(&self) -> bool {
        matches!(self, Self::ActionPending)
    }

    /// Check if the issue ended in an unrecovered condition
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// States an operator may acknowledge from. Resolved issues settle on
    /// their own and are not acknowledgeable.
    pub fn is_acknowledgeable(&self) -> bool {
        matches!(self, Self::Detected | Self::ActionPending | Self::Failed)
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detected => write!(f, "detected"),
            Self::ActionPending => write!(f, "action_pending"),
            Self::Resolved => write!(f, "resolved"),
            Self::Failed => write!(f, "failed"),
            Self::Acknowledged => write!(f, "acknowledged"),
        }
    }
}

impl std::str::FromStr for IssueState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detected" => Ok(Self::Detected),
            "action_pending" => Ok(Self::ActionPending),
            "resolved" => Ok(Self::Resolved),
            "failed" => Ok(Self::Failed),
            "acknowledged" => Ok(Self::Acknowledged),
            _ => Err(format!("Invalid issue state: {s}")),
        }
    }
}

impl Default for IssueState {
    fn default() -> Self {
        Self::Detected
    }
}
