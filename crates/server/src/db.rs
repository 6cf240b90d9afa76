use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create the PostgreSQL connection pool and run migrations.
pub async fn init_pg_pool(
    config: &listmill_core::config::PostgresConfig,
) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;
    info!(host = %config.host, database = %config.database, "PostgreSQL connected");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("database migrations applied");

    Ok(pool)
}
