use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::AppConfig;

/// Owns the PostgreSQL connection pool for the lifetime of a process.
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Opens a pool sized by `DATABASE_MAX_CONNECTIONS`.
    pub async fn connect(config: &AppConfig) -> Result<Self, sqlx::Error> {
        Self::connect_url(&config.database_url, config.max_connections).await
    }

    pub async fn connect_url(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to database");
        Ok(Self { pool })
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
