use catalog_common::types::MappingRow;
use sqlx::{Postgres, QueryBuilder};

use super::{StoreClient, StoreError};

impl StoreClient {
    /// Distinct `(inference_provider, provider_slug)` pairs from the
    /// working table, optionally filtered to one provider. Empty slugs
    /// are excluded.
    pub async fn fetch_working_slugs(
        &self,
        table: &str,
        provider: Option<&str>,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let rows: Vec<(String, String)> = match provider {
            Some(provider) => sqlx::query_as(&format!(
                "SELECT DISTINCT inference_provider, provider_slug FROM {table} \
                 WHERE provider_slug IS NOT NULL AND provider_slug != '' \
                 AND inference_provider = $1 \
                 ORDER BY inference_provider, provider_slug"
            ))
            .bind(provider)
            .fetch_all(self.pool())
            .await,
            None => {
                sqlx::query_as(&format!(
                    "SELECT DISTINCT inference_provider, provider_slug FROM {table} \
                     WHERE provider_slug IS NOT NULL AND provider_slug != '' \
                     ORDER BY inference_provider, provider_slug"
                ))
                .fetch_all(self.pool())
                .await
            }
        }
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(rows)
    }

    /// All distinct performance-metric slugs from the read-only table.
    pub async fn fetch_aa_slugs(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT aa_slug FROM {table} ORDER BY aa_slug"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }

    /// Idempotent mapping upsert keyed on (inference_provider,
    /// provider_slug); re-runs only advance aa_slug and updated_at.
    pub async fn upsert_mappings(
        &self,
        table: &str,
        mappings: &[MappingRow],
    ) -> Result<usize, StoreError> {
        if mappings.is_empty() {
            tracing::warn!("No mappings to upsert");
            return Ok(0);
        }

        for chunk in mappings.chunks(100) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {table} (inference_provider, provider_slug, aa_slug, created_at, updated_at) "
            ));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.inference_provider)
                    .push_bind(&row.provider_slug)
                    .push_bind(&row.aa_slug)
                    .push_bind(row.created_at)
                    .push_bind(row.updated_at);
            });
            builder.push(
                " ON CONFLICT (inference_provider, provider_slug) DO UPDATE SET \
                 aa_slug = EXCLUDED.aa_slug, updated_at = EXCLUDED.updated_at",
            );

            builder
                .build()
                .execute(self.pool())
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;
        }

        tracing::info!(mappings = mappings.len(), "Mappings upserted");
        Ok(mappings.len())
    }
}
