//! Ingestion error types.

use thiserror::Error;

use crate::store::StoreError;

/// Unrecoverable failure while processing one ingestion job.
///
/// Validation rejections are not errors — invalid addresses are counted and
/// excluded. This type covers store/queue failures that abort the job and
/// hand retry control back to the queue.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] listmill_queue::QueueError),
}
