//! Long-running consumer loop.
//!
//! Polls the job queue, dispatches each message to the worker, and acks or
//! nacks based on the outcome. A nacked message is redelivered by the queue
//! with an incremented attempt count; the loop sleeps an exponentially
//! growing delay before nacking so retries back off. Messages whose body
//! does not parse are acked and dropped — redelivering a poison message
//! can never succeed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use listmill_queue::{parse_job, JobConsumer};

use crate::worker::IngestionWorker;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const MAX_POLL_BACKOFF_EXP: u32 = 5;

/// Tuning for [`run_ingestion_loop`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Messages requested per poll.
    pub poll_batch_size: u32,
    /// Sleep between polls that return nothing.
    pub poll_interval: Duration,
    /// Delay before the first retry; doubles per subsequent attempt.
    pub retry_initial_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_batch_size: 10,
            poll_interval: Duration::from_millis(500),
            retry_initial_delay: Duration::from_secs(1),
        }
    }
}

/// Run the consumer loop until `shutdown` flips to true.
///
/// Poll errors do not kill the loop; they back off exponentially and keep
/// trying, since a transient queue outage should not take the worker down.
pub async fn run_ingestion_loop(
    consumer: Arc<dyn JobConsumer>,
    worker: Arc<IngestionWorker>,
    config: RunnerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        poll_batch_size = config.poll_batch_size,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "ingestion loop started"
    );

    let mut consecutive_poll_errors: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let messages = match consumer.poll(config.poll_batch_size).await {
            Ok(messages) => {
                consecutive_poll_errors = 0;
                messages
            }
            Err(e) => {
                consecutive_poll_errors += 1;
                let backoff = Duration::from_secs(
                    2u64.pow(consecutive_poll_errors.min(MAX_POLL_BACKOFF_EXP)),
                );
                error!(
                    error = %e,
                    consecutive_errors = consecutive_poll_errors,
                    backoff_secs = backoff.as_secs(),
                    "queue poll failed"
                );
                if wait_or_shutdown(&mut shutdown, backoff).await {
                    break;
                }
                continue;
            }
        };

        if messages.is_empty() {
            if wait_or_shutdown(&mut shutdown, config.poll_interval).await {
                break;
            }
            continue;
        }

        for msg in messages {
            let job = match parse_job(&msg) {
                Ok(job) => job,
                Err(e) => {
                    warn!(message_id = %msg.id, error = %e, "dropping unparseable message");
                    if let Err(ack_err) = consumer.ack(&msg.receipt_handle).await {
                        error!(message_id = %msg.id, error = %ack_err, "failed to ack poison message");
                    }
                    continue;
                }
            };

            debug!(
                message_id = %msg.id,
                group_id = %job.group_id,
                attempt = msg.attempt_count,
                emails = job.raw_emails.len(),
                "processing ingestion job"
            );

            match worker.process(&job).await {
                Ok(_) => {
                    if let Err(e) = consumer.ack(&msg.receipt_handle).await {
                        // At-least-once: the job's work is idempotent, so a
                        // redelivery after a lost ack is harmless.
                        error!(message_id = %msg.id, error = %e, "failed to ack completed job");
                    }
                }
                Err(e) => {
                    let delay = retry_delay(config.retry_initial_delay, msg.attempt_count);
                    warn!(
                        message_id = %msg.id,
                        group_id = %job.group_id,
                        attempt = msg.attempt_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "job failed, scheduling retry"
                    );
                    if wait_or_shutdown(&mut shutdown, delay).await {
                        // Skip the nack: visibility will lapse (SQS) or the
                        // message stays in flight until restart (memory).
                        return;
                    }
                    if let Err(nack_err) = consumer.nack(&msg.receipt_handle).await {
                        error!(message_id = %msg.id, error = %nack_err, "failed to nack job");
                    }
                }
            }
        }
    }

    info!("ingestion loop stopped");
}

/// Backoff before the `attempt`-th retry: initial * 2^(attempt-1), capped.
fn retry_delay(initial: Duration, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1).min(MAX_POLL_BACKOFF_EXP));
    initial.saturating_mul(factor as u32).min(MAX_RETRY_DELAY)
}

/// Sleep for `duration` unless shutdown is signalled first. Returns true on
/// shutdown.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryAddressStore, MemoryGroupStatusStore};
    use crate::progress::NoopProgress;
    use listmill_core::GroupStatus;
    use listmill_queue::{IngestionJob, JobProducer, MemoryQueue};
    use uuid::Uuid;

    fn fixture() -> (
        Arc<MemoryQueue>,
        Arc<MemoryAddressStore>,
        Arc<MemoryGroupStatusStore>,
        Arc<IngestionWorker>,
    ) {
        let queue = Arc::new(MemoryQueue::new(3));
        let addresses = Arc::new(MemoryAddressStore::new());
        let groups = Arc::new(MemoryGroupStatusStore::new());
        let worker = Arc::new(IngestionWorker::new(
            addresses.clone(),
            groups.clone(),
            Arc::new(NoopProgress),
            1000,
        ));
        (queue, addresses, groups, worker)
    }

    fn fast_config() -> RunnerConfig {
        RunnerConfig {
            poll_batch_size: 10,
            poll_interval: Duration::from_millis(5),
            retry_initial_delay: Duration::from_millis(1),
        }
    }

    async fn run_until<F>(
        queue: Arc<MemoryQueue>,
        worker: Arc<IngestionWorker>,
        mut done: F,
    ) where
        F: FnMut() -> bool,
    {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_ingestion_loop(
            queue,
            worker,
            fast_config(),
            rx,
        ));
        for _ in 0..500 {
            if done() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(done(), "condition not reached before timeout");
        let _ = tx.send(true);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_successful_job_is_acked_and_applied() {
        let (queue, addresses, groups, worker) = fixture();
        let group_id = Uuid::new_v4();
        groups.create(group_id);

        let job = IngestionJob::new(group_id, vec!["a@x.com".to_string(), "b@x.com".to_string()]);
        queue.enqueue(&job).await.unwrap();

        {
            let groups = groups.clone();
            run_until(queue.clone(), worker, move || {
                groups.status_of(group_id) == Some(GroupStatus::Completed)
            })
            .await;
        }

        assert_eq!(addresses.emails(group_id).len(), 2);
        assert_eq!(queue.depth(), 0);
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_failing_job_retries_then_dead_letters() {
        let (queue, addresses, groups, worker) = fixture();
        let group_id = Uuid::new_v4();
        groups.create(group_id);
        addresses.set_unavailable(true);

        let job = IngestionJob::new(group_id, vec!["a@x.com".to_string()]);
        queue.enqueue(&job).await.unwrap();

        {
            let queue = queue.clone();
            let q = queue.clone();
            run_until(queue, worker, move || !q.dead_letters().is_empty()).await;
        }

        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempt_count, 3);
        assert_eq!(groups.status_of(group_id), Some(GroupStatus::Failed));
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_retry() {
        let (queue, addresses, groups, worker) = fixture();
        let group_id = Uuid::new_v4();
        groups.create(group_id);
        // First insert batch fails, later attempts succeed.
        addresses.fail_after_batches(0);

        let job = IngestionJob::new(group_id, vec!["a@x.com".to_string()]);
        queue.enqueue(&job).await.unwrap();

        // Heal the store once the first attempt has failed.
        {
            let addresses = addresses.clone();
            let groups2 = groups.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    if groups2.status_of(group_id) == Some(GroupStatus::Failed) {
                        addresses.fail_after_batches(u32::MAX);
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            });
        }

        {
            let groups = groups.clone();
            run_until(queue.clone(), worker, move || {
                groups.status_of(group_id) == Some(GroupStatus::Completed)
            })
            .await;
        }

        assert_eq!(groups.count_of(group_id), Some(1));
        assert!(queue.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_poison_message_is_acked_and_dropped() {
        let (queue, _addresses, _groups, worker) = fixture();

        // A body the producer API could never emit.
        let msg = listmill_queue::JobMessage {
            id: "poison".to_string(),
            body: "definitely not json".to_string(),
            receipt_handle: String::new(),
            enqueued_at: chrono::Utc::now(),
            attempt_count: 0,
        };
        queue.inject(msg);

        {
            let q = queue.clone();
            run_until(queue.clone(), worker, move || {
                q.depth() == 0 && q.in_flight() == 0
            })
            .await;
        }

        // Dropped without retries and without dead-lettering.
        assert!(queue.dead_letters().is_empty());
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let initial = Duration::from_secs(1);
        assert_eq!(retry_delay(initial, 1), Duration::from_secs(1));
        assert_eq!(retry_delay(initial, 2), Duration::from_secs(2));
        assert_eq!(retry_delay(initial, 3), Duration::from_secs(4));
        assert_eq!(retry_delay(initial, 10), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_loop() {
        let (queue, _addresses, _groups, worker) = fixture();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_ingestion_loop(queue, worker, fast_config(), rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
