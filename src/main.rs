use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entsoe_backend::config::AppConfig;
use entsoe_backend::jobs::{gap_analysis_sync, realtime_collection_sync};
use entsoe_backend::services::backfill::BackfillService;
use entsoe_backend::services::backfill_progress::SeaOrmProgressStore;
use entsoe_backend::services::data_points::SeaOrmDataPointStore;
use entsoe_backend::services::entsoe::EntsoeClient;
use entsoe_backend::services::storage::{DataPointStore, ProgressStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,entsoe_backend=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let points: Arc<dyn DataPointStore> = Arc::new(SeaOrmDataPointStore::new(db.clone()));
    let progress: Arc<dyn ProgressStore> = Arc::new(SeaOrmProgressStore::new(db));

    let client = EntsoeClient::from_config(config.transport.clone())?;
    let backfill = BackfillService::new(
        client.clone(),
        points.clone(),
        progress,
        config.backfill.clone(),
    );

    let targets = config.collection_targets()?;
    tracing::info!(
        targets = targets.len(),
        base_url = %config.transport.base_url,
        "Starting ENTSO-E collection"
    );

    realtime_collection_sync::start_realtime_collection_job(
        client,
        points,
        targets.clone(),
        config.collection_interval.as_secs(),
    )
    .await;

    gap_analysis_sync::start_gap_analysis_job(
        backfill,
        targets,
        config.gap_analysis_interval.as_secs(),
        config.gap_analysis_lookback_days,
    )
    .await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, exiting");

    Ok(())
}
