//! Email address group domain types.
//!
//! A group is a named recipient list. Its `status` column is the externally
//! visible signal of ingestion health and is driven by the pipeline:
//! the API moves a group to `waiting` when it enqueues a job, the worker
//! owns every transition after that.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Region ───────────────────────────────────────────────────────────

/// Sending region for a group (affects which relay pool is used elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Domestic,
    Overseas,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domestic => "domestic",
            Self::Overseas => "overseas",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "domestic" => Some(Self::Domestic),
            "overseas" => Some(Self::Overseas),
            _ => None,
        }
    }
}

// ── Status state machine ─────────────────────────────────────────────

/// Ingestion status of a group.
///
/// `pending → waiting → processing → completed | failed`. A group in any
/// state may receive a new "add emails" request, which re-enters `waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Created, no ingestion ever requested.
    Pending,
    /// A job has been enqueued and not yet picked up.
    Waiting,
    /// A worker is actively merging a job for this group.
    Processing,
    /// Last job finished successfully.
    Completed,
    /// Last job aborted; operator must re-trigger ingestion.
    Failed,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Waiting => "waiting",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "waiting" => Some(Self::Waiting),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status ends a job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ── Database row ─────────────────────────────────────────────────────

/// Row from the `email_address_groups` table.
///
/// `region` and `status` are stored as TEXT; use [`EmailAddressGroup::status`]
/// and [`EmailAddressGroup::region`] for the typed view.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailAddressGroup {
    pub id: Uuid,
    pub name: String,
    pub region: String,
    pub status: String,
    pub address_count: i64,
    /// Opaque per-group key-value payload for template personalization.
    /// Never touched by the ingestion pipeline.
    pub mail_merge_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailAddressGroup {
    /// Typed status, defaulting to `Pending` on an unrecognized value.
    pub fn status(&self) -> GroupStatus {
        GroupStatus::from_str(&self.status).unwrap_or(GroupStatus::Pending)
    }

    /// Typed region, defaulting to `Domestic` on an unrecognized value.
    pub fn region(&self) -> Region {
        Region::from_str(&self.region).unwrap_or(Region::Domestic)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
