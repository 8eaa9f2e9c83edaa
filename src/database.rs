use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::store::PgStore;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        info!(pool_size, "database pool ready");
        Ok(Database { pool })
    }

    /// Connects using `config`; `None` when no URL is configured.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Option<Self>, sqlx::Error> {
        match config.url.as_deref() {
            Some(url) => Self::new(url, config.pool_size).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }

    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }
}
