//! Ingestion progress side channel.
//!
//! Progress is observability for UI polling, never control flow: sinks
//! must be infallible and cheap.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

/// Receives per-group progress percentages (0..=100).
pub trait ProgressSink: Send + Sync {
    fn report(&self, group_id: Uuid, percent: u8);
}

/// Discards all reports.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _group_id: Uuid, _percent: u8) {}
}

/// Shared map of last-reported progress per group, polled by the API.
#[derive(Clone, Default)]
pub struct SharedProgress {
    map: Arc<RwLock<HashMap<Uuid, u8>>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reported percent for a group; 0 when nothing was reported yet.
    pub fn get(&self, group_id: Uuid) -> u8 {
        self.map
            .read()
            .expect("progress lock poisoned")
            .get(&group_id)
            .copied()
            .unwrap_or(0)
    }

    /// Drop a group's entry, e.g. when the group itself is deleted.
    pub fn clear(&self, group_id: Uuid) {
        self.map
            .write()
            .expect("progress lock poisoned")
            .remove(&group_id);
    }
}

impl ProgressSink for SharedProgress {
    fn report(&self, group_id: Uuid, percent: u8) {
        self.map
            .write()
            .expect("progress lock poisoned")
            .insert(group_id, percent.min(100));
    }
}
