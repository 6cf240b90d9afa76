//! Bulk-email operations console server.
//!
//! Boots the HTTP API and the in-process ingestion worker against one
//! PostgreSQL pool. With `INGEST_QUEUE_URL` set (and the `queue-sqs`
//! feature compiled in) jobs flow through SQS instead of the in-process
//! queue, so API nodes and workers can be scaled separately.

mod api;
mod db;
mod groups;
mod router;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use listmill_ingest::{
    run_ingestion_loop, IngestionWorker, PgAddressStore, PgGroupStatusStore, RunnerConfig,
    SharedProgress,
};
use listmill_queue::{JobConsumer, JobProducer, MemoryQueue};

use crate::state::AppState;

type QueuePair = (Arc<dyn JobProducer>, Arc<dyn JobConsumer>);

async fn build_queue(config: &listmill_core::Config) -> anyhow::Result<QueuePair> {
    if config.sqs.is_configured() {
        #[cfg(feature = "queue-sqs")]
        {
            let queue = Arc::new(listmill_queue::SqsQueue::new(&config.sqs).await?);
            info!("queue backend: sqs");
            let producer: Arc<dyn JobProducer> = queue.clone();
            let consumer: Arc<dyn JobConsumer> = queue;
            return Ok((producer, consumer));
        }
        #[cfg(not(feature = "queue-sqs"))]
        anyhow::bail!(
            "INGEST_QUEUE_URL is set but this binary was built without the 'queue-sqs' feature"
        );
    }

    let queue = Arc::new(MemoryQueue::new(config.ingest.max_delivery_attempts));
    info!("queue backend: in-process");
    let producer: Arc<dyn JobProducer> = queue.clone();
    let consumer: Arc<dyn JobConsumer> = queue;
    Ok((producer, consumer))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    listmill_core::config::load_dotenv();
    let config = listmill_core::Config::from_env();
    config.log_summary();

    let pool = db::init_pg_pool(&config.postgres).await?;
    let (producer, consumer) = build_queue(&config).await?;

    let group_status = Arc::new(PgGroupStatusStore::new(pool.clone()));
    let progress = SharedProgress::new();

    let worker = Arc::new(IngestionWorker::new(
        Arc::new(PgAddressStore::new(pool.clone())),
        group_status.clone(),
        Arc::new(progress.clone()),
        config.ingest.insert_batch_size,
    ));

    let runner_config = RunnerConfig {
        poll_batch_size: 10,
        poll_interval: Duration::from_millis(config.ingest.poll_interval_ms),
        retry_initial_delay: Duration::from_millis(config.ingest.retry_initial_delay_ms),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(run_ingestion_loop(
        consumer.clone(),
        worker,
        runner_config,
        shutdown_rx,
    ));

    let app_state = Arc::new(AppState {
        pool,
        producer,
        consumer,
        group_status,
        progress,
    });
    let app = router::build_router(app_state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Stop the worker loop after the HTTP server has drained.
    let _ = shutdown_tx.send(true);
    let _ = runner.await;
    info!("shutdown complete");

    Ok(())
}
