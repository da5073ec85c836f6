//! # Health Monitor
//!
//! Bounded, time-windowed resource metrics per backend target, fed by
//! metric-tagged probe results independent of scan cadence and read by
//! external consumers (dashboard polling) as atomic snapshots.
//!
//! Eviction is strict FIFO by timestamp once a window reaches capacity.
//! A snapshot never observes a torn or partially evicted window: ingestion
//! holds the window's write access for the whole mutation.

use crate::connector::ProbeResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;
use uuid::Uuid;

/// One metric observation inside a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub probe: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Atomic copy of one target's current metric window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub target_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub readings: Vec<MetricReading>,
}

#[derive(Debug, Default)]
struct HealthWindow {
    readings: VecDeque<MetricReading>,
}

impl HealthWindow {
    /// Insert preserving timestamp order, then evict the oldest entries
    /// beyond capacity.
    fn push(&mut self, reading: MetricReading, capacity: usize) {
        let position = self
            .readings
            .iter()
            .rposition(|existing| existing.recorded_at <= reading.recorded_at)
            .map(|index| index + 1)
            .unwrap_or(0);
        self.readings.insert(position, reading);

        while self.readings.len() > capacity {
            self.readings.pop_front();
        }
    }
}

/// Per-target rolling metric windows
pub struct HealthMonitor {
    windows: DashMap<Uuid, HealthWindow>,
    capacity: usize,
}

impl HealthMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: DashMap::new(),
            capacity,
        }
    }

    /// Ingest one reading for a target
    pub fn ingest(&self, target_id: Uuid, reading: MetricReading) {
        trace!(
            target_id = %target_id,
            probe = %reading.probe,
            value = reading.value,
            "Health reading ingested"
        );
        self.windows
            .entry(target_id)
            .or_default()
            .push(reading, self.capacity);
    }

    /// Ingest a metric-tagged probe result. Non-numeric values carry no
    /// plottable signal and are skipped; returns whether the result landed.
    pub fn ingest_probe_result(&self, result: &ProbeResult) -> bool {
        match result.value.as_f64() {
            Some(value) => {
                self.ingest(
                    result.target_id,
                    MetricReading {
                        probe: result.probe.clone(),
                        value,
                        recorded_at: result.recorded_at,
                    },
                );
                true
            }
            None => false,
        }
    }

    /// Atomic copy of one target's window, oldest reading first
    pub fn snapshot(&self, target_id: Uuid) -> Option<HealthSnapshot> {
        self.windows.get(&target_id).map(|window| HealthSnapshot {
            target_id,
            taken_at: Utc::now(),
            readings: window.readings.iter().cloned().collect(),
        })
    }

    /// Snapshot every tracked target
    pub fn snapshot_all(&self) -> Vec<HealthSnapshot> {
        self.windows
            .iter()
            .map(|entry| HealthSnapshot {
                target_id: *entry.key(),
                taken_at: Utc::now(),
                readings: entry.value().readings.iter().cloned().collect(),
            })
            .collect()
    }

    /// Drop a target's window entirely
    pub fn forget(&self, target_id: Uuid) {
        self.windows.remove(&target_id);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
