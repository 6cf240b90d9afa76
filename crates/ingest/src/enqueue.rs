//! Producer-side entry point used by the API.

use tracing::info;
use uuid::Uuid;

use listmill_core::GroupStatus;
use listmill_queue::{IngestionJob, JobProducer};

use crate::error::IngestError;
use crate::progress::ProgressSink;
use crate::store::GroupStatusStore;

/// Mark the group WAITING, reset its progress, and enqueue an ingestion
/// job for it.
///
/// The status write happens first so a client polling right after the
/// request sees the group as queued even if the worker has not picked the
/// job up yet. Progress is reset to 0 in the same breath: without it a
/// re-triggered ingestion would keep showing the previous job's 100 until
/// the first batch lands. If the enqueue itself fails the error propagates
/// and the group stays WAITING; re-submitting is safe.
pub async fn enqueue_ingestion(
    producer: &dyn JobProducer,
    groups: &dyn GroupStatusStore,
    progress: &dyn ProgressSink,
    group_id: Uuid,
    raw_emails: Vec<String>,
) -> Result<(), IngestError> {
    groups.set_status(group_id, GroupStatus::Waiting).await?;
    progress.report(group_id, 0);

    let count = raw_emails.len();
    producer
        .enqueue(&IngestionJob::new(group_id, raw_emails))
        .await?;

    info!(group_id = %group_id, emails = count, "ingestion job enqueued");
    Ok(())
}
