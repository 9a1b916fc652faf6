mod mapping;
mod rate_limits;
mod working;

pub use working::WorkingRow;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// PostgreSQL client for the working, production, rate-limits, and
/// mapping tables. Table names arrive fully qualified from configuration;
/// all data values are bound parameters.
pub struct StoreClient {
    pool: PgPool,
}

impl StoreClient {
    /// Connect with the pipeline-writer DSN and verify liveness.
    /// URL-encoded passwords in the DSN are handled by the driver.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let client = Self { pool };
        client.health_check().await?;
        tracing::info!("PostgreSQL connection established");

        Ok(client)
    }

    /// Verify the connection is alive.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("PostgreSQL connection error: {0}")]
    Connection(String),

    #[error("PostgreSQL query error: {0}")]
    Query(String),
}

impl From<StoreError> for catalog_common::CatalogError {
    fn from(e: StoreError) -> Self {
        catalog_common::CatalogError::Postgres(e.to_string())
    }
}
