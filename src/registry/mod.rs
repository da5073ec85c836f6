//! # Target Registry
//!
//! Thread-safe registry of the backend targets under diagnosis. Targets
//! are registered at configuration load and handed to the orchestrator as
//! immutable snapshots per scan; a target never changes during a scan
//! cycle.

use crate::connector::{BackendKind, BackendTarget};
use crate::error::{Result, SentinelError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Registry statistics for the admin surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_targets: usize,
    pub content_managers: usize,
    pub search_engines: usize,
    pub studios: usize,
}

/// Registry of backend targets
pub struct TargetRegistry {
    targets: RwLock<HashMap<Uuid, BackendTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            targets: RwLock::new(HashMap::new()),
        }
    }

    /// Register a target. Re-registering an id replaces the previous entry.
    pub async fn register(&self, target: BackendTarget) -> Uuid {
        let id = target.id;
        info!(
            target_id = %id,
            kind = %target.kind,
            name = %target.name,
            "📚 Target registered"
        );
        self.targets.write().await.insert(id, target);
        id
    }

    /// Remove a target from the registry
    pub async fn remove(&self, target_id: Uuid) -> Result<BackendTarget> {
        let removed = self.targets.write().await.remove(&target_id);
        match removed {
            Some(target) => {
                debug!(target_id = %target_id, name = %target.name, "Target removed");
                Ok(target)
            }
            None => Err(SentinelError::TargetNotFound {
                target_id: target_id.to_string(),
            }),
        }
    }

    pub async fn get(&self, target_id: Uuid) -> Result<BackendTarget> {
        self.targets
            .read()
            .await
            .get(&target_id)
            .cloned()
            .ok_or_else(|| SentinelError::TargetNotFound {
                target_id: target_id.to_string(),
            })
    }

    /// Snapshot of every registered target
    pub async fn list(&self) -> Vec<BackendTarget> {
        self.targets.read().await.values().cloned().collect()
    }

    /// Snapshot of the targets of one backend kind
    pub async fn by_kind(&self, kind: BackendKind) -> Vec<BackendTarget> {
        self.targets
            .read()
            .await
            .values()
            .filter(|target| target.kind == kind)
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> RegistryStats {
        let targets = self.targets.read().await;
        let count_kind = |kind: BackendKind| targets.values().filter(|t| t.kind == kind).count();
        RegistryStats {
            total_targets: targets.len(),
            content_managers: count_kind(BackendKind::ContentManager),
            search_engines: count_kind(BackendKind::SearchEngine),
            studios: count_kind(BackendKind::Studio),
        }
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
