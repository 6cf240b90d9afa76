//! CRUD operations for the `email_address_groups` PostgreSQL table.
//!
//! [`GroupStore`] is a stateless unit struct with async methods that take
//! a `&PgPool`. Name and region validation happens before hitting the
//! database; duplicate names surface as a 409 via the unique index.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use listmill_core::{EmailAddressGroup, Region};

const GROUP_COLUMNS: &str =
    "id, name, region, status, address_count, mail_merge_data, created_at, updated_at";

// ── Request types ────────────────────────────────────────────────────

/// Parameters for creating an address group.
#[derive(Debug, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub region: String,
    /// Defaults to `{}` if not provided.
    pub mail_merge_data: Option<serde_json::Value>,
}

// ── Error type ───────────────────────────────────────────────────────

/// Errors from group store operations.
#[derive(Debug)]
pub enum GroupStoreError {
    EmptyName,
    InvalidRegion(String),
    NotFound(Uuid),
    DuplicateName(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for GroupStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "group name must not be empty"),
            Self::InvalidRegion(r) => write!(
                f, "invalid region '{}': must be one of: domestic, overseas", r
            ),
            Self::NotFound(id) => write!(f, "address group not found: {}", id),
            Self::DuplicateName(name) => write!(
                f, "duplicate name '{}': an address group with this name already exists", name
            ),
            Self::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for GroupStoreError {}

impl From<sqlx::Error> for GroupStoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e)
    }
}

impl GroupStoreError {
    /// Map to an HTTP status code for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EmptyName | Self::InvalidRegion(_) => 400,
            Self::NotFound(_) => 404,
            Self::DuplicateName(_) => 409,
            Self::Database(_) => 500,
        }
    }
}

/// Translate a unique-constraint violation into a 409, everything else
/// passes through as a database error.
fn map_unique_violation(e: sqlx::Error, name: &str) -> GroupStoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            return GroupStoreError::DuplicateName(name.to_string());
        }
    }
    GroupStoreError::Database(e)
}

// ── Store ────────────────────────────────────────────────────────────

/// Stateless CRUD store for `email_address_groups`.
pub struct GroupStore;

impl GroupStore {
    /// Create a new address group in the `pending` state.
    pub async fn create(
        pool: &PgPool,
        req: CreateGroup,
    ) -> Result<EmailAddressGroup, GroupStoreError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(GroupStoreError::EmptyName);
        }
        if Region::from_str(&req.region).is_none() {
            return Err(GroupStoreError::InvalidRegion(req.region));
        }

        let mail_merge_data = req.mail_merge_data.unwrap_or_else(|| serde_json::json!({}));

        let result = sqlx::query_as::<_, EmailAddressGroup>(&format!(
            "INSERT INTO email_address_groups (name, region, mail_merge_data)
             VALUES ($1, $2, $3)
             RETURNING {GROUP_COLUMNS}"
        ))
        .bind(name)
        .bind(&req.region)
        .bind(&mail_merge_data)
        .fetch_one(pool)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(e) => Err(map_unique_violation(e, name)),
        }
    }

    /// List all address groups, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<EmailAddressGroup>, GroupStoreError> {
        let rows = sqlx::query_as::<_, EmailAddressGroup>(&format!(
            "SELECT {GROUP_COLUMNS}
             FROM email_address_groups
             ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Get a single address group by ID.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<EmailAddressGroup, GroupStoreError> {
        let row = sqlx::query_as::<_, EmailAddressGroup>(&format!(
            "SELECT {GROUP_COLUMNS}
             FROM email_address_groups
             WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.ok_or(GroupStoreError::NotFound(id))
    }

    /// Delete a group; its addresses go with it via ON DELETE CASCADE.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), GroupStoreError> {
        let result = sqlx::query("DELETE FROM email_address_groups WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(GroupStoreError::NotFound(id));
        }
        Ok(())
    }
}
