use std::sync::Arc;

use sqlx::PgPool;

use listmill_ingest::{PgGroupStatusStore, SharedProgress};
use listmill_queue::{JobConsumer, JobProducer};

pub struct AppState {
    pub pool: PgPool,
    pub producer: Arc<dyn JobProducer>,
    pub consumer: Arc<dyn JobConsumer>,
    pub group_status: Arc<PgGroupStatusStore>,
    pub progress: SharedProgress,
}
