//! # Diagnostic Rules
//!
//! Rule catalog (data) and the deterministic evaluation engine that turns a
//! target's probe batch into typed detections.

pub mod catalog;
pub mod engine;

pub use catalog::{builtin_catalog, CatalogProbe, ComparisonOp, Rule, RuleCatalog, RuleCondition};
pub use engine::{Detection, Evaluation, RuleEngine, RuleFailure};
