//! In-process job queue.
//!
//! The default backend for single-node deployments: the API and the worker
//! share one [`MemoryQueue`] inside the server process. Semantics mirror
//! the SQS backend — FIFO delivery, at-least-once via nack redelivery with
//! an incremented attempt count, and a dead-letter list once a message
//! exhausts its delivery attempts.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::consumer::{JobConsumer, JobProducer, QueueHealth};
use crate::error::QueueError;
use crate::job::{IngestionJob, JobMessage};

#[derive(Default)]
struct Inner {
    ready: VecDeque<JobMessage>,
    in_flight: HashMap<String, JobMessage>,
    dead_letter: Vec<JobMessage>,
}

/// In-process FIFO queue with at-least-once delivery.
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    max_attempts: u32,
}

impl MemoryQueue {
    /// `max_attempts` bounds deliveries per message; a message nacked on
    /// its final attempt moves to the dead-letter list.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Snapshot of dead-lettered messages, oldest first.
    pub fn dead_letters(&self) -> Vec<JobMessage> {
        self.inner.lock().expect("queue mutex poisoned").dead_letter.clone()
    }

    /// Messages waiting for delivery (excludes in-flight).
    pub fn depth(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").ready.len()
    }

    /// Messages delivered but neither acked nor nacked yet.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").in_flight.len()
    }

    /// Enqueue a raw message, bypassing job serialization. Lets tests feed
    /// malformed bodies the producer API cannot produce.
    pub fn inject(&self, msg: JobMessage) {
        self.inner.lock().expect("queue mutex poisoned").ready.push_back(msg);
    }
}

#[async_trait]
impl JobProducer for MemoryQueue {
    async fn enqueue(&self, job: &IngestionJob) -> Result<(), QueueError> {
        let msg = JobMessage {
            id: Uuid::new_v4().to_string(),
            body: job.to_body()?,
            receipt_handle: String::new(),
            enqueued_at: Utc::now(),
            attempt_count: 0,
        };
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.ready.push_back(msg);
        Ok(())
    }
}

#[async_trait]
impl JobConsumer for MemoryQueue {
    async fn poll(&self, max_messages: u32) -> Result<Vec<JobMessage>, QueueError> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let take = (max_messages as usize).min(inner.ready.len());
        let mut delivered = Vec::with_capacity(take);
        for _ in 0..take {
            let mut msg = match inner.ready.pop_front() {
                Some(m) => m,
                None => break,
            };
            msg.attempt_count += 1;
            msg.receipt_handle = Uuid::new_v4().to_string();
            inner.in_flight.insert(msg.receipt_handle.clone(), msg.clone());
            delivered.push(msg);
        }
        Ok(delivered)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))
    }

    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let msg = inner
            .in_flight
            .remove(receipt_handle)
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))?;

        if msg.attempt_count >= self.max_attempts {
            inner.dead_letter.push(msg);
        } else {
            // Front of the line so retries are prompt; the runner applies
            // the backoff delay before redelivering.
            inner.ready.push_front(msg);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let inner = self.inner.lock().expect("queue mutex poisoned");
        Ok(QueueHealth {
            connected: true,
            approximate_message_count: Some(inner.ready.len() as u64),
            provider: "memory".to_string(),
        })
    }

    async fn dead_letter_depth(&self) -> Result<Option<u64>, QueueError> {
        let inner = self.inner.lock().expect("queue mutex poisoned");
        Ok(Some(inner.dead_letter.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job(n: usize) -> IngestionJob {
        IngestionJob::new(Uuid::new_v4(), vec![format!("user{}@x.com", n)])
    }

    #[tokio::test]
    async fn test_fifo_delivery() {
        let queue = MemoryQueue::new(3);
        let a = make_job(1);
        let b = make_job(2);
        queue.enqueue(&a).await.unwrap();
        queue.enqueue(&b).await.unwrap();

        let msgs = queue.poll(10).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(crate::parse_job(&msgs[0]).unwrap(), a);
        assert_eq!(crate::parse_job(&msgs[1]).unwrap(), b);
        assert_eq!(queue.depth(), 0);
        assert_eq!(queue.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_poll_respects_max_messages() {
        let queue = MemoryQueue::new(3);
        for n in 0..5 {
            queue.enqueue(&make_job(n)).await.unwrap();
        }
        let msgs = queue.poll(2).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(queue.depth(), 3);
    }

    #[tokio::test]
    async fn test_ack_removes_message() {
        let queue = MemoryQueue::new(3);
        queue.enqueue(&make_job(1)).await.unwrap();
        let msgs = queue.poll(1).await.unwrap();
        queue.ack(&msgs[0].receipt_handle).await.unwrap();

        assert_eq!(queue.depth(), 0);
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.poll(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nack_redelivers_with_incremented_attempt() {
        let queue = MemoryQueue::new(3);
        queue.enqueue(&make_job(1)).await.unwrap();

        let first = queue.poll(1).await.unwrap().remove(0);
        assert_eq!(first.attempt_count, 1);
        queue.nack(&first.receipt_handle).await.unwrap();

        let second = queue.poll(1).await.unwrap().remove(0);
        assert_eq!(second.attempt_count, 2);
        assert_eq!(second.id, first.id);
        // Fresh receipt handle per delivery.
        assert_ne!(second.receipt_handle, first.receipt_handle);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_dead_letter() {
        let queue = MemoryQueue::new(3);
        queue.enqueue(&make_job(1)).await.unwrap();

        for _ in 0..3 {
            let msg = queue.poll(1).await.unwrap().remove(0);
            queue.nack(&msg.receipt_handle).await.unwrap();
        }

        assert!(queue.poll(1).await.unwrap().is_empty());
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempt_count, 3);
        assert_eq!(queue.dead_letter_depth().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_receipt_handle() {
        let queue = MemoryQueue::new(3);
        let err = queue.ack("bogus").await.unwrap_err();
        assert!(matches!(err, QueueError::UnknownReceipt(_)));
        let err = queue.nack("bogus").await.unwrap_err();
        assert!(matches!(err, QueueError::UnknownReceipt(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let queue = MemoryQueue::new(3);
        queue.enqueue(&make_job(1)).await.unwrap();
        let health = queue.health_check().await.unwrap();
        assert!(health.connected);
        assert_eq!(health.approximate_message_count, Some(1));
        assert_eq!(health.provider, "memory");
    }

    #[tokio::test]
    async fn test_nacked_message_is_redelivered_before_newer_ones() {
        let queue = MemoryQueue::new(5);
        let a = make_job(1);
        let b = make_job(2);
        queue.enqueue(&a).await.unwrap();
        queue.enqueue(&b).await.unwrap();

        let first = queue.poll(1).await.unwrap().remove(0);
        queue.nack(&first.receipt_handle).await.unwrap();

        let next = queue.poll(1).await.unwrap().remove(0);
        assert_eq!(next.id, first.id);
    }
}
