//! Core domain models shared across the diagnostic engine

pub mod issue;
pub mod scan_run;

pub use issue::{Issue, IssueTransition, Severity};
pub use scan_run::{FailureKind, ScanRun, ScanStatus, TargetFailure, TargetOutcome};
