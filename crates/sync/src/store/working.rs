use catalog_common::types::DbRow;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use super::{StoreClient, StoreError};

/// A full catalog row as stored, id included. Text columns stay optional
/// so a backup restores NULLs as NULLs.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct WorkingRow {
    pub id: i64,
    pub inference_provider: Option<String>,
    pub model_provider: Option<String>,
    pub human_readable_name: Option<String>,
    pub provider_slug: Option<String>,
    pub model_provider_country: Option<String>,
    pub official_url: Option<String>,
    pub input_modalities: Option<String>,
    pub output_modalities: Option<String>,
    pub license_info_text: Option<String>,
    pub license_info_url: Option<String>,
    pub license_name: Option<String>,
    pub license_url: Option<String>,
    pub rate_limits: Option<String>,
    pub provider_api_access: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

const ROW_COLUMNS: &str = "id, inference_provider, model_provider, human_readable_name, \
     provider_slug, model_provider_country, official_url, input_modalities, output_modalities, \
     license_info_text, license_info_url, license_name, license_url, rate_limits, \
     provider_api_access, created_at, updated_at";

impl StoreClient {
    /// Row count of one provider slice.
    pub async fn count_slice(&self, table: &str, provider: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {table} WHERE inference_provider = $1"
        ))
        .bind(provider)
        .fetch_one(self.pool())
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(count)
    }

    /// Backup a provider slice into memory, every column included.
    pub async fn backup_slice(
        &self,
        table: &str,
        provider: &str,
    ) -> Result<Vec<WorkingRow>, StoreError> {
        sqlx::query_as::<_, WorkingRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM {table} WHERE inference_provider = $1 ORDER BY id"
        ))
        .bind(provider)
        .fetch_all(self.pool())
        .await
        .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Delete a provider slice. One statement, one transaction.
    pub async fn delete_slice(&self, table: &str, provider: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE inference_provider = $1"
        ))
        .bind(provider)
        .execute(self.pool())
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Insert prepared rows in batches via multi-VALUES statements, each
    /// batch its own committed transaction. The database assigns ids.
    pub async fn insert_rows(
        &self,
        table: &str,
        rows: &[DbRow],
        batch_size: usize,
    ) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for chunk in rows.chunks(batch_size.max(1)) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {table} ({}) ",
                DbRow::COLUMNS.join(", ")
            ));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.inference_provider)
                    .push_bind(&row.model_provider)
                    .push_bind(&row.human_readable_name)
                    .push_bind(&row.provider_slug)
                    .push_bind(&row.model_provider_country)
                    .push_bind(&row.official_url)
                    .push_bind(&row.input_modalities)
                    .push_bind(&row.output_modalities)
                    .push_bind(&row.license_info_text)
                    .push_bind(&row.license_info_url)
                    .push_bind(&row.license_name)
                    .push_bind(&row.license_url)
                    .push_bind(&row.rate_limits)
                    .push_bind(&row.provider_api_access)
                    .push_bind(row.created_at)
                    .push_bind(row.updated_at);
            });

            builder
                .build()
                .execute(self.pool())
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;
            inserted += chunk.len();
            tracing::debug!(inserted = inserted, total = rows.len(), "Batch committed");
        }

        metrics::counter!("catalog.sync.rows_inserted").increment(inserted as u64);
        Ok(inserted)
    }

    /// Re-insert backed-up rows verbatim, ids included. Used only by
    /// rollback-restore after a failed refresh.
    pub async fn insert_backup_rows(
        &self,
        table: &str,
        rows: &[WorkingRow],
        batch_size: usize,
    ) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for chunk in rows.chunks(batch_size.max(1)) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {table} ({ROW_COLUMNS}) "));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.id)
                    .push_bind(&row.inference_provider)
                    .push_bind(&row.model_provider)
                    .push_bind(&row.human_readable_name)
                    .push_bind(&row.provider_slug)
                    .push_bind(&row.model_provider_country)
                    .push_bind(&row.official_url)
                    .push_bind(&row.input_modalities)
                    .push_bind(&row.output_modalities)
                    .push_bind(&row.license_info_text)
                    .push_bind(&row.license_info_url)
                    .push_bind(&row.license_name)
                    .push_bind(&row.license_url)
                    .push_bind(&row.rate_limits)
                    .push_bind(&row.provider_api_access)
                    .push_bind(row.created_at)
                    .push_bind(row.updated_at);
            });

            builder
                .build()
                .execute(self.pool())
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;
            inserted += chunk.len();
        }
        Ok(inserted)
    }

    /// Read a provider slice for comparison or promotion.
    pub async fn read_slice(
        &self,
        table: &str,
        provider: &str,
    ) -> Result<Vec<WorkingRow>, StoreError> {
        self.backup_slice(table, provider).await
    }
}
