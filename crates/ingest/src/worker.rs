//! Address ingestion worker.
//!
//! One job runs the five pipeline stages strictly in sequence: dedup,
//! validate, diff against existing rows, batched insert-or-ignore with
//! progress reporting, then recount and finalize. Re-running the same job
//! is safe: the diff step excludes rows committed by an earlier attempt.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
#[cfg(test)]
use uuid::Uuid;

use listmill_core::{is_valid_email, GroupStatus};
use listmill_queue::IngestionJob;

use crate::error::IngestError;
use crate::progress::ProgressSink;
use crate::store::{AddressStore, GroupStatusStore};

/// Per-stage counts from one job, for observability.
///
/// Invariants: `unique_emails = valid_emails + invalid_emails` and
/// `valid_emails = new_emails + duplicate_emails`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    /// Raw candidates in the job, duplicates and garbage included.
    pub total_emails: usize,
    /// Survivors of lower-case in-batch dedup.
    pub unique_emails: usize,
    /// Survivors of validation.
    pub valid_emails: usize,
    /// Actually inserted candidates (not previously in the group).
    pub new_emails: usize,
    /// Valid candidates already present in the group.
    pub duplicate_emails: usize,
    /// Candidates rejected by the validator.
    pub invalid_emails: usize,
}

/// Processes ingestion jobs against the address and group stores.
///
/// Explicitly constructed with its collaborators — no ambient state. Safe
/// to share across tasks; each `process` call is self-contained.
pub struct IngestionWorker {
    addresses: Arc<dyn AddressStore>,
    groups: Arc<dyn GroupStatusStore>,
    progress: Arc<dyn ProgressSink>,
    batch_size: usize,
}

impl IngestionWorker {
    pub fn new(
        addresses: Arc<dyn AddressStore>,
        groups: Arc<dyn GroupStatusStore>,
        progress: Arc<dyn ProgressSink>,
        batch_size: usize,
    ) -> Self {
        Self {
            addresses,
            groups,
            progress,
            batch_size: batch_size.max(1),
        }
    }

    /// Merge one job into its group's address book.
    ///
    /// On error the group is marked FAILED best-effort and the error is
    /// re-raised so the queue's retry policy applies. Batches committed
    /// before the failure remain committed.
    pub async fn process(&self, job: &IngestionJob) -> Result<IngestionReport, IngestError> {
        match self.run(job).await {
            Ok(report) => {
                info!(
                    group_id = %job.group_id,
                    total = report.total_emails,
                    unique = report.unique_emails,
                    valid = report.valid_emails,
                    new = report.new_emails,
                    duplicate = report.duplicate_emails,
                    invalid = report.invalid_emails,
                    "ingestion job completed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(group_id = %job.group_id, error = %e, "ingestion job failed");
                // Best-effort: a failure to persist FAILED must not mask
                // the original error.
                if let Err(mark_err) = self
                    .groups
                    .set_status(job.group_id, GroupStatus::Failed)
                    .await
                {
                    warn!(
                        group_id = %job.group_id,
                        error = %mark_err,
                        "could not mark group failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run(&self, job: &IngestionJob) -> Result<IngestionReport, IngestError> {
        let group_id = job.group_id;

        // Visible to readers immediately, before any row is written.
        self.groups
            .set_status(group_id, GroupStatus::Processing)
            .await?;

        let total_emails = job.raw_emails.len();

        // In-batch dedup: one survivor per distinct lower-cased value.
        let unique: HashSet<String> = job
            .raw_emails
            .iter()
            .map(|e| e.to_lowercase())
            .collect();
        let unique_emails = unique.len();

        // Validation: rejects are data, not errors.
        let valid: Vec<String> = unique
            .into_iter()
            .filter(|e| is_valid_email(e))
            .collect();
        let valid_emails = valid.len();
        let invalid_emails = unique_emails - valid_emails;

        // Diff against rows already in the group.
        let existing = self
            .addresses
            .find_existing_lowercased(group_id, &valid)
            .await?;
        let new_emails_list: Vec<String> = valid
            .into_iter()
            .filter(|e| !existing.contains(e))
            .collect();
        let new_emails = new_emails_list.len();
        let duplicate_emails = valid_emails - new_emails;

        // Batched transactional insert with progress after each commit.
        if new_emails == 0 {
            self.progress.report(group_id, 100);
        } else {
            let mut inserted = 0usize;
            for batch in new_emails_list.chunks(self.batch_size) {
                self.addresses
                    .insert_batch_ignoring_duplicates(group_id, batch)
                    .await?;
                inserted += batch.len();
                let percent = (inserted * 100 / new_emails) as u8;
                self.progress.report(group_id, percent);
            }
        }

        // Recount from the store, not by accumulation — self-corrects
        // against concurrent mutation of the same group.
        let address_count = self.addresses.count_by_group(group_id).await?;
        self.groups
            .set_status_and_count(group_id, GroupStatus::Completed, address_count)
            .await?;

        Ok(IngestionReport {
            total_emails,
            unique_emails,
            valid_emails,
            new_emails,
            duplicate_emails,
            invalid_emails,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────
