use catalog_common::types::DbRow;
use chrono::Utc;

use crate::refresh::{run_protocol, CountCheck, RefreshOutcome};
use crate::store::{StoreClient, StoreError, WorkingRow};

/// Promote a working-table slice to production with the backup/restore
/// protocol. Count verification tolerates `max(1, ⌊tolerance·n⌋)` rows of
/// drift from concurrent production writers; beyond that the backup is
/// restored.
pub async fn promote_slice(
    store: &StoreClient,
    working_table: &str,
    production_table: &str,
    provider: &str,
    tolerance: f64,
    batch_size: usize,
) -> Result<RefreshOutcome, StoreError> {
    let staged = store.read_slice(working_table, provider).await?;
    let prepared = prepare_for_production(&staged);
    tracing::info!(
        provider = provider,
        rows = prepared.len(),
        "Staged rows loaded for promotion"
    );

    let allowed = allowed_deviation(prepared.len(), tolerance);
    run_protocol(
        store,
        production_table,
        provider,
        &prepared,
        batch_size,
        CountCheck::Tolerance(allowed),
    )
    .await
}

/// Working rows become fresh production inserts: the id stays behind for
/// the production table to assign, and updated_at is stamped now.
pub fn prepare_for_production(staged: &[WorkingRow]) -> Vec<DbRow> {
    let now = Utc::now();
    staged
        .iter()
        .map(|row| DbRow {
            inference_provider: row.inference_provider.clone().unwrap_or_default(),
            model_provider: row.model_provider.clone().unwrap_or_default(),
            human_readable_name: row.human_readable_name.clone().unwrap_or_default(),
            provider_slug: row.provider_slug.clone().unwrap_or_default(),
            model_provider_country: row.model_provider_country.clone().unwrap_or_default(),
            official_url: row.official_url.clone().unwrap_or_default(),
            input_modalities: row.input_modalities.clone().unwrap_or_default(),
            output_modalities: row.output_modalities.clone().unwrap_or_default(),
            license_info_text: row.license_info_text.clone().unwrap_or_default(),
            license_info_url: row.license_info_url.clone().unwrap_or_default(),
            license_name: row.license_name.clone().unwrap_or_default(),
            license_url: row.license_url.clone().unwrap_or_default(),
            rate_limits: row.rate_limits.clone().unwrap_or_default(),
            provider_api_access: row.provider_api_access.clone().unwrap_or_default(),
            created_at: row.created_at.unwrap_or(now),
            updated_at: now,
        })
        .collect()
}

/// Absolute count deviation the verify step accepts.
pub fn allowed_deviation(prepared: usize, tolerance: f64) -> i64 {
    ((prepared as f64 * tolerance) as i64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_deviation_floor_and_minimum() {
        assert_eq!(allowed_deviation(10, 0.05), 1); // 0.5 floors to 0, min 1
        assert_eq!(allowed_deviation(100, 0.05), 5);
        assert_eq!(allowed_deviation(59, 0.05), 2);
        assert_eq!(allowed_deviation(0, 0.05), 1);
    }

    #[test]
    fn test_prepare_for_production_strips_id() {
        let staged = vec![WorkingRow {
            id: 42,
            inference_provider: Some("Groq".into()),
            model_provider: Some("Meta".into()),
            human_readable_name: Some("Llama 3.1 8B Instant".into()),
            provider_slug: Some("llama-3.1-8b-instant".into()),
            model_provider_country: None,
            official_url: None,
            input_modalities: Some("Text".into()),
            output_modalities: Some("Text".into()),
            license_info_text: None,
            license_info_url: None,
            license_name: Some("Llama 3.1".into()),
            license_url: None,
            rate_limits: None,
            provider_api_access: None,
            created_at: None,
            updated_at: None,
        }];
        let prepared = prepare_for_production(&staged);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].inference_provider, "Groq");
        assert_eq!(prepared[0].human_readable_name, "Llama 3.1 8B Instant");
        // NULL text columns become empty strings in the fresh insert.
        assert_eq!(prepared[0].model_provider_country, "");
    }
}
