use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engine::scheduler::{spawn_scheduler, LogReminderSink};
use engine::{DatabaseConfig, EngineConfig, LifecycleController};
use infra::{LedgerStore, PgLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let database = DatabaseConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .idle_timeout(Some(Duration::from_secs(600))) // 10 minutes
        .max_lifetime(Some(Duration::from_secs(1800))) // 30 minutes
        .connect(&database.url)
        .await?;
    tracing::info!(
        "Connected to Postgres with max {} connections",
        database.max_connections
    );

    let config = EngineConfig::from_env();
    tracing::info!(
        "Seating {} tables of {}, repeat payments: {:?}",
        config.max_tables,
        config.seats_per_table,
        config.payment_repeat_policy
    );

    let ledger: Arc<dyn LedgerStore> = Arc::new(PgLedger::new(pool));
    let controller = LifecycleController::new(ledger, config);

    let handles = spawn_scheduler(controller, Arc::new(LogReminderSink));
    tracing::info!("Automation scheduler started with {} sweeps", handles.len());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
