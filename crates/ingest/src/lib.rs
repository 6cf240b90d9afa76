//! Asynchronous email-address ingestion pipeline.
//!
//! The API enqueues an [`IngestionJob`](listmill_queue::IngestionJob) via
//! [`enqueue_ingestion`]; [`run_ingestion_loop`] consumes jobs and hands
//! them to the [`IngestionWorker`], which dedups, validates, diffs and
//! batch-inserts the addresses, then finalizes the group's status and
//! count. Stores are trait seams with Postgres and in-memory backends.

pub mod enqueue;
pub mod error;
pub mod memory;
pub mod pg;
pub mod progress;
pub mod runner;
pub mod store;
pub mod worker;

pub use enqueue::enqueue_ingestion;
pub use error::IngestError;
pub use memory::{MemoryAddressStore, MemoryGroupStatusStore};
pub use pg::{PgAddressStore, PgGroupStatusStore};
pub use progress::{NoopProgress, ProgressSink, SharedProgress};
pub use runner::{run_ingestion_loop, RunnerConfig};
pub use store::{AddressStore, GroupStatusStore, StoreError};
pub use worker::{IngestionReport, IngestionWorker};
