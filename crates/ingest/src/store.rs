//! Store traits consumed by the ingestion worker.
//!
//! The worker depends only on these seams; production wires the Postgres
//! implementations (`pg`), tests wire the in-memory ones (`memory`).

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use listmill_core::GroupStatus;

/// Errors from the address/group stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("group not found: {0}")]
    GroupNotFound(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map to an HTTP status code for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::GroupNotFound(_) => 404,
            Self::Unavailable(_) => 503,
            Self::Database(_) => 500,
        }
    }
}

/// Persisted set of (group, email) pairs.
///
/// Uniqueness on (group, lower(email)) is the store's responsibility; the
/// worker diffs defensively but relies on insert-or-ignore for races.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Return the lower-cased emails among `candidates` that already exist
    /// for this group. `candidates` are expected to be lower-cased.
    async fn find_existing_lowercased(
        &self,
        group_id: Uuid,
        candidates: &[String],
    ) -> Result<HashSet<String>, StoreError>;

    /// Insert a batch of addresses with default field values, silently
    /// skipping rows that collide with an existing (group, lower(email))
    /// pair. Transactional: the batch commits or rolls back as a whole.
    async fn insert_batch_ignoring_duplicates(
        &self,
        group_id: Uuid,
        emails: &[String],
    ) -> Result<(), StoreError>;

    /// Authoritative row count for a group.
    async fn count_by_group(&self, group_id: Uuid) -> Result<i64, StoreError>;
}

/// Persisted group status state machine.
#[async_trait]
pub trait GroupStatusStore: Send + Sync {
    async fn set_status(&self, group_id: Uuid, status: GroupStatus) -> Result<(), StoreError>;

    /// Update status and address count in one atomic write.
    async fn set_status_and_count(
        &self,
        group_id: Uuid,
        status: GroupStatus,
        count: i64,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StoreError::GroupNotFound(Uuid::new_v4()).status_code(), 404);
        assert_eq!(StoreError::Unavailable("down".into()).status_code(), 503);
        assert_eq!(StoreError::Database(sqlx::Error::PoolClosed).status_code(), 500);
    }
}
