//! In-memory store implementations.
//!
//! Same observable semantics as the Postgres stores, including the
//! insert-or-ignore conflict behavior, plus failure injection for the
//! partial-batch and unavailability scenarios.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use listmill_core::GroupStatus;

use crate::store::{AddressStore, GroupStatusStore, StoreError};

// ── Address store ────────────────────────────────────────────────────

#[derive(Default)]
struct AddressInner {
    /// Per group: stored emails in insertion order.
    rows: HashMap<Uuid, Vec<String>>,
    /// Per group: lower-cased emails for conflict checks.
    lower: HashMap<Uuid, HashSet<String>>,
    batches_committed: u32,
    fail_after_batches: Option<u32>,
    unavailable: bool,
}

#[derive(Default)]
pub struct MemoryAddressStore {
    inner: Mutex<AddressInner>,
}

impl MemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation with `Unavailable` from now on.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().expect("store lock poisoned").unavailable = unavailable;
    }

    /// Let `n` insert batches commit, then fail the next one. Batches
    /// committed before the failure stay committed.
    pub fn fail_after_batches(&self, n: u32) {
        self.inner.lock().expect("store lock poisoned").fail_after_batches = Some(n);
    }

    /// Stored emails for a group, insertion order.
    pub fn emails(&self, group_id: Uuid) -> Vec<String> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .rows
            .get(&group_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn batches_committed(&self) -> u32 {
        self.inner.lock().expect("store lock poisoned").batches_committed
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn find_existing_lowercased(
        &self,
        group_id: Uuid,
        candidates: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        if inner.unavailable {
            return Err(StoreError::Unavailable("address store offline".into()));
        }
        let existing = match inner.lower.get(&group_id) {
            Some(set) => set,
            None => return Ok(HashSet::new()),
        };
        Ok(candidates
            .iter()
            .filter(|c| existing.contains(c.to_lowercase().as_str()))
            .map(|c| c.to_lowercase())
            .collect())
    }

    async fn insert_batch_ignoring_duplicates(
        &self,
        group_id: Uuid,
        emails: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.unavailable {
            return Err(StoreError::Unavailable("address store offline".into()));
        }
        if let Some(limit) = inner.fail_after_batches {
            if inner.batches_committed >= limit {
                return Err(StoreError::Unavailable("connection lost mid-batch".into()));
            }
        }

        // All-or-nothing per batch, like a transaction.
        let lower = inner.lower.entry(group_id).or_default();
        let mut accepted = Vec::with_capacity(emails.len());
        for email in emails {
            if lower.insert(email.to_lowercase()) {
                accepted.push(email.clone());
            }
        }
        inner.rows.entry(group_id).or_default().extend(accepted);
        inner.batches_committed += 1;
        Ok(())
    }

    async fn count_by_group(&self, group_id: Uuid) -> Result<i64, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        if inner.unavailable {
            return Err(StoreError::Unavailable("address store offline".into()));
        }
        Ok(inner.rows.get(&group_id).map(|v| v.len()).unwrap_or(0) as i64)
    }
}

// ── Group status store ───────────────────────────────────────────────

#[derive(Default)]
struct GroupInner {
    groups: HashMap<Uuid, (GroupStatus, i64)>,
    /// Every transition in order, for state-machine assertions.
    history: Vec<(Uuid, GroupStatus)>,
    fail_writes: bool,
}

#[derive(Default)]
pub struct MemoryGroupStatusStore {
    inner: Mutex<GroupInner>,
}

impl MemoryGroupStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group in its initial state.
    pub fn create(&self, group_id: Uuid) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.groups.insert(group_id, (GroupStatus::Pending, 0));
    }

    /// Make all writes fail, for error-masking tests.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().expect("store lock poisoned").fail_writes = fail;
    }

    pub fn status_of(&self, group_id: Uuid) -> Option<GroupStatus> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner.groups.get(&group_id).map(|(s, _)| *s)
    }

    pub fn count_of(&self, group_id: Uuid) -> Option<i64> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner.groups.get(&group_id).map(|(_, c)| *c)
    }

    /// Transition history for a group, oldest first.
    pub fn history(&self, group_id: Uuid) -> Vec<GroupStatus> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .history
            .iter()
            .filter(|(id, _)| *id == group_id)
            .map(|(_, s)| *s)
            .collect()
    }
}

#[async_trait]
impl GroupStatusStore for MemoryGroupStatusStore {
    async fn set_status(&self, group_id: Uuid, status: GroupStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.fail_writes {
            return Err(StoreError::Unavailable("group store offline".into()));
        }
        let entry = inner
            .groups
            .get_mut(&group_id)
            .ok_or(StoreError::GroupNotFound(group_id))?;
        entry.0 = status;
        inner.history.push((group_id, status));
        Ok(())
    }

    async fn set_status_and_count(
        &self,
        group_id: Uuid,
        status: GroupStatus,
        count: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.fail_writes {
            return Err(StoreError::Unavailable("group store offline".into()));
        }
        let entry = inner
            .groups
            .get_mut(&group_id)
            .ok_or(StoreError::GroupNotFound(group_id))?;
        *entry = (status, count);
        inner.history.push((group_id, status));
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_skips_case_insensitive_conflicts() {
        let store = MemoryAddressStore::new();
        let group = Uuid::new_v4();
        store
            .insert_batch_ignoring_duplicates(group, &["a@x.com".to_string()])
            .await
            .unwrap();
        store
            .insert_batch_ignoring_duplicates(group, &["A@X.com".to_string(), "b@x.com".to_string()])
            .await
            .unwrap();

        assert_eq!(store.count_by_group(group).await.unwrap(), 2);
        assert_eq!(store.emails(group), vec!["a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn test_find_existing_lowercased() {
        let store = MemoryAddressStore::new();
        let group = Uuid::new_v4();
        store
            .insert_batch_ignoring_duplicates(group, &["a@x.com".to_string()])
            .await
            .unwrap();

        let existing = store
            .find_existing_lowercased(group, &["a@x.com".to_string(), "b@x.com".to_string()])
            .await
            .unwrap();
        assert_eq!(existing.len(), 1);
        assert!(existing.contains("a@x.com"));
    }

    #[tokio::test]
    async fn test_fail_after_batches() {
        let store = MemoryAddressStore::new();
        let group = Uuid::new_v4();
        store.fail_after_batches(1);

        store
            .insert_batch_ignoring_duplicates(group, &["a@x.com".to_string()])
            .await
            .unwrap();
        let err = store
            .insert_batch_ignoring_duplicates(group, &["b@x.com".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        // The first batch stays committed.
        assert_eq!(store.count_by_group(group).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_group_status_transitions_recorded() {
        let store = MemoryGroupStatusStore::new();
        let group = Uuid::new_v4();
        store.create(group);
        assert_eq!(store.status_of(group), Some(GroupStatus::Pending));

        store.set_status(group, GroupStatus::Waiting).await.unwrap();
        store
            .set_status_and_count(group, GroupStatus::Completed, 5)
            .await
            .unwrap();

        assert_eq!(store.status_of(group), Some(GroupStatus::Completed));
        assert_eq!(store.count_of(group), Some(5));
        assert_eq!(
            store.history(group),
            vec![GroupStatus::Waiting, GroupStatus::Completed]
        );
    }

    #[tokio::test]
    async fn test_unknown_group_rejected() {
        let store = MemoryGroupStatusStore::new();
        let err = store
            .set_status(Uuid::new_v4(), GroupStatus::Waiting)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::GroupNotFound(_)));
    }
}
