//! Job queue abstraction for the ingestion pipeline.
//!
//! [`JobProducer`] and [`JobConsumer`] are the seams; [`MemoryQueue`] is
//! the in-process default and [`SqsQueue`] the multi-node backend behind
//! the `queue-sqs` feature.

pub mod consumer;
pub mod error;
pub mod job;
pub mod memory;
pub mod sqs;

pub use consumer::{JobConsumer, JobProducer, QueueHealth};
pub use error::QueueError;
pub use job::{parse_job, IngestionJob, JobMessage};
pub use memory::MemoryQueue;
pub use sqs::SqsQueue;
