//! Producer/consumer traits for the ingestion job queue.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::QueueError;
use crate::job::{IngestionJob, JobMessage};

/// Health status of a queue connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Whether the queue is reachable.
    pub connected: bool,
    /// Approximate number of messages waiting in the queue.
    pub approximate_message_count: Option<u64>,
    /// Queue provider name (e.g., "memory", "sqs").
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, messages: {:?}, provider: {} }}",
            self.connected, self.approximate_message_count, self.provider
        )
    }
}

/// Producer side: the API enqueues a job and returns immediately.
#[async_trait]
pub trait JobProducer: Send + Sync {
    /// Durably enqueue a job for asynchronous processing.
    async fn enqueue(&self, job: &IngestionJob) -> Result<(), QueueError>;
}

/// Consumer side of a queue backend.
///
/// Implementations handle polling, acknowledging, and redelivery for a
/// particular provider. Delivery is at-least-once: a message that is
/// nacked (or whose visibility lapses) is delivered again with an
/// incremented `attempt_count`.
#[async_trait]
pub trait JobConsumer: Send + Sync {
    /// Poll up to `max_messages` from the queue.
    ///
    /// Returns an empty vec if no messages are available.
    async fn poll(&self, max_messages: u32) -> Result<Vec<JobMessage>, QueueError>;

    /// Acknowledge successful processing — removes the message from the queue.
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Negative-acknowledge — returns the message to the queue for retry.
    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Check queue connectivity and return health status.
    async fn health_check(&self) -> Result<QueueHealth, QueueError>;

    /// Get approximate depth of the dead-letter queue (if supported).
    async fn dead_letter_depth(&self) -> Result<Option<u64>, QueueError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_health_display() {
        let health = QueueHealth {
            connected: true,
            approximate_message_count: Some(7),
            provider: "memory".to_string(),
        };
        let display = format!("{}", health);
        assert!(display.contains("connected: true"));
        assert!(display.contains("7"));
        assert!(display.contains("memory"));
    }
}
