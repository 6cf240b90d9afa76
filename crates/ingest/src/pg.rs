//! Postgres-backed store implementations.
//!
//! Schema: `email_address_groups` and `email_addresses` with a unique
//! index on `(address_group_id, lower(email))`. Case-insensitive conflict
//! handling lives in the database so concurrent jobs cannot race past the
//! application-level diff.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use listmill_core::GroupStatus;

use crate::store::{AddressStore, GroupStatusStore, StoreError};

#[derive(Clone)]
pub struct PgAddressStore {
    pool: PgPool,
}

impl PgAddressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressStore for PgAddressStore {
    async fn find_existing_lowercased(
        &self,
        group_id: Uuid,
        candidates: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT lower(email)
            FROM email_addresses
            WHERE address_group_id = $1
              AND lower(email) = ANY($2)
            "#,
        )
        .bind(group_id)
        .bind(candidates)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn insert_batch_ignoring_duplicates(
        &self,
        group_id: Uuid,
        emails: &[String],
    ) -> Result<(), StoreError> {
        if emails.is_empty() {
            return Ok(());
        }
        // One multi-row statement per batch: atomic, and the ON CONFLICT
        // target is the unique expression index, so rows racing in from
        // another job are skipped instead of aborting the batch.
        let result = sqlx::query(
            r#"
            INSERT INTO email_addresses (address_group_id, email)
            SELECT $1, candidate
            FROM UNNEST($2::text[]) AS candidate
            ON CONFLICT (address_group_id, lower(email)) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(emails)
        .execute(&self.pool)
        .await?;

        debug!(
            group_id = %group_id,
            batch = emails.len(),
            inserted = result.rows_affected(),
            "address batch committed"
        );
        Ok(())
    }

    async fn count_by_group(&self, group_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM email_addresses WHERE address_group_id = $1",
        )
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[derive(Clone)]
pub struct PgGroupStatusStore {
    pool: PgPool,
}

impl PgGroupStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupStatusStore for PgGroupStatusStore {
    async fn set_status(&self, group_id: Uuid, status: GroupStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE email_address_groups
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(group_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::GroupNotFound(group_id));
        }
        Ok(())
    }

    async fn set_status_and_count(
        &self,
        group_id: Uuid,
        status: GroupStatus,
        count: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE email_address_groups
            SET status = $2, address_count = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(group_id)
        .bind(status.as_str())
        .bind(count)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::GroupNotFound(group_id));
        }
        Ok(())
    }
}
