use catalog_common::types::RateLimitRow;
use sqlx::{Postgres, QueryBuilder};

use super::{StoreClient, StoreError};

impl StoreClient {
    /// Delete the rate-limit rows for one provider.
    pub async fn delete_rate_limits(&self, table: &str, provider: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE inference_provider = $1"
        ))
        .bind(provider)
        .execute(self.pool())
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        tracing::info!(deleted = result.rows_affected(), provider = provider, "Rate limits deleted");
        Ok(result.rows_affected())
    }

    /// Upsert rate-limit rows keyed by human_readable_name. The update
    /// branch refreshes every value column and stamps updated_at.
    pub async fn upsert_rate_limits(
        &self,
        table: &str,
        rows: &[RateLimitRow],
    ) -> Result<usize, StoreError> {
        if rows.is_empty() {
            tracing::warn!("No rate limit rows to upsert");
            return Ok(0);
        }

        for chunk in rows.chunks(100) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {table} (human_readable_name, inference_provider, rpm, rpd, tpm, tpd, raw_string, parseable) "
            ));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.human_readable_name)
                    .push_bind(&row.inference_provider)
                    .push_bind(row.rpm)
                    .push_bind(row.rpd)
                    .push_bind(row.tpm)
                    .push_bind(row.tpd)
                    .push_bind(&row.raw_string)
                    .push_bind(row.parseable);
            });
            builder.push(
                " ON CONFLICT (human_readable_name) DO UPDATE SET \
                 rpm = EXCLUDED.rpm, rpd = EXCLUDED.rpd, tpm = EXCLUDED.tpm, tpd = EXCLUDED.tpd, \
                 raw_string = EXCLUDED.raw_string, parseable = EXCLUDED.parseable, \
                 updated_at = CURRENT_TIMESTAMP",
            );

            builder
                .build()
                .execute(self.pool())
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;
        }

        tracing::info!(rows = rows.len(), "Rate limits upserted");
        Ok(rows.len())
    }
}
