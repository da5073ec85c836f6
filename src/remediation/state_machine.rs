//! # Issue State Machine
//!
//! Transition table for the remediation lifecycle of one issue. The
//! machine is purely in-memory: it validates a transition, records it in
//! the issue's append-only history, and returns the new state. Scheduling,
//! retries, and verification live in the engine; nothing here blocks.

use super::events::IssueEvent;
use super::states::IssueState;
use crate::error::{Result, SentinelError};
use crate::models::Issue;

/// Validates and applies issue state transitions
pub struct IssueStateMachine;

impl IssueStateMachine {
    /// Attempt to transition the issue, recording the change in its history
    pub fn transition(issue: &mut Issue, event: IssueEvent) -> Result<IssueState> {
        let target_state = Self::determine_target_state(issue.state, &event)?;
        Self::check_guards(issue, &event)?;

        let note = event.failure_reason().map(str::to_string);
        issue.record_transition(target_state, note);
        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(current: IssueState, event: &IssueEvent) -> Result<IssueState> {
        let target = match (current, event) {
            (IssueState::Detected, IssueEvent::StartRemediation) => IssueState::ActionPending,

            (IssueState::ActionPending, IssueEvent::VerificationConfirmed) => IssueState::Resolved,
            (IssueState::ActionPending, IssueEvent::RemediationExhausted(_)) => IssueState::Failed,

            // Operator acknowledgement from any non-settled state
            (IssueState::Detected, IssueEvent::Acknowledge)
            | (IssueState::ActionPending, IssueEvent::Acknowledge)
            | (IssueState::Failed, IssueEvent::Acknowledge) => IssueState::Acknowledged,

            (from, event) => {
                return Err(SentinelError::StateTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Guard conditions beyond the transition table
    fn check_guards(issue: &Issue, event: &IssueEvent) -> Result<()> {
        if matches!(event, IssueEvent::StartRemediation) && !issue.has_action() {
            return Err(SentinelError::StateTransition {
                from: issue.state.to_string(),
                event: "start_remediation (rule is report-only)".to_string(),
            });
        }
        Ok(())
    }
}
