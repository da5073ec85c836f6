//! Lifecycle event system for external consumers

pub mod publisher;

pub use publisher::{DiagnosticEvent, EventPublisher};
