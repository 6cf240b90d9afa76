//! Ingestion job payload and delivery envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;

/// A unit of ingestion work: an address group plus the raw candidate list
/// exactly as extracted from the uploaded file — not yet validated or
/// deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub group_id: Uuid,
    pub raw_emails: Vec<String>,
}

impl IngestionJob {
    pub fn new(group_id: Uuid, raw_emails: Vec<String>) -> Self {
        Self { group_id, raw_emails }
    }

    /// Serialize to the JSON message body carried on the queue.
    pub fn to_body(&self) -> Result<String, QueueError> {
        serde_json::to_string(self)
            .map_err(|e| QueueError::Parse(format!("failed to serialize job: {}", e)))
    }
}

/// A raw message as delivered by a queue backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    /// Unique message identifier from the queue provider.
    pub id: String,
    /// Raw message body (JSON-encoded [`IngestionJob`]).
    pub body: String,
    /// Provider-specific handle for ack/nack.
    pub receipt_handle: String,
    /// When the message was first enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Number of times this message has been delivered.
    pub attempt_count: u32,
}

/// Decode a delivered message body into a typed [`IngestionJob`].
pub fn parse_job(msg: &JobMessage) -> Result<IngestionJob, QueueError> {
    serde_json::from_str(&msg.body)
        .map_err(|e| QueueError::Parse(format!("invalid job body in message {}: {}", msg.id, e)))
}
