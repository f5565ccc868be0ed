use anyhow::Context;
use chrono::{Datelike, Utc};
use dotenv::dotenv;
use schooldesk_core::db::Database;
use schooldesk_core::fees::seed_standard_structures;
use schooldesk_core::store::PgStore;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Inserts the standard per-class fee structures for an academic year.
///
/// The year defaults to the current calendar year and can be given as the
/// first argument. Classes that already have an active structure are skipped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let academic_year = std::env::args()
        .nth(1)
        .unwrap_or_else(|| Utc::now().year().to_string());
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let db = Database::connect_url(&database_url, 2)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    db.migrate().await?;

    let store = PgStore::new(db.pool().clone());
    let outcome = seed_standard_structures(&store, &academic_year)
        .await
        .map_err(|e| anyhow::anyhow!("Seeding failed: {}", e))?;

    for structure in &outcome.created {
        info!(
            class_name = %structure.class_name,
            total = %structure.total_monthly_fee,
            "Created fee structure"
        );
    }
    info!(
        academic_year = %academic_year,
        created = outcome.created.len(),
        skipped = outcome.skipped.len(),
        "Fee structure seeding completed"
    );

    db.close().await;
    Ok(())
}
