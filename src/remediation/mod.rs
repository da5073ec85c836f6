// Remediation module for the diagnostic core
//
// Provides the issue lifecycle state machine and the engine that drives
// corrective actions against backends with retry, backoff, and post-action
// verification.

pub mod engine;
pub mod events;
pub mod state_machine;
pub mod states;

// Re-export main types for convenient access
pub use engine::RemediationEngine;
pub use events::IssueEvent;
pub use state_machine::IssueStateMachine;
pub use states::IssueState;
