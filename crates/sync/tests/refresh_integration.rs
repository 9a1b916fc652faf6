//! Integration tests for the sync engine against a live PostgreSQL.
//! All tests are `#[ignore]`; run with `cargo test -- --ignored` and
//! PIPELINE_SUPABASE_URL pointing at a scratch database.

use catalog_common::types::DbRow;
use catalog_sync::refresh::{refresh_slice, RefreshState};
use catalog_sync::StoreClient;
use chrono::Utc;

const TEST_TABLE: &str = "public.catalog_refresh_test";

async fn setup() -> StoreClient {
    let dsn = std::env::var("PIPELINE_SUPABASE_URL")
        .expect("PIPELINE_SUPABASE_URL must be set for integration tests");
    let store = StoreClient::connect(&dsn, 5)
        .await
        .expect("Failed to connect to PostgreSQL");

    // A scratch working table with a poison constraint so insert failure
    // can be triggered deterministically mid-batch.
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {TEST_TABLE} (
            id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
            inference_provider TEXT NOT NULL,
            model_provider TEXT,
            human_readable_name TEXT NOT NULL,
            provider_slug TEXT NOT NULL,
            model_provider_country TEXT,
            official_url TEXT,
            input_modalities TEXT,
            output_modalities TEXT,
            license_info_text TEXT,
            license_info_url TEXT,
            license_name TEXT CHECK (license_name IS DISTINCT FROM 'poison'),
            license_url TEXT,
            rate_limits TEXT,
            provider_api_access TEXT,
            created_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ
        )"
    ))
    .execute(store.pool())
    .await
    .expect("Failed to create scratch table");

    sqlx::query(&format!("DELETE FROM {TEST_TABLE}"))
        .execute(store.pool())
        .await
        .expect("Failed to clean scratch table");

    store
}

fn row(name: &str, license_name: &str) -> DbRow {
    let now = Utc::now();
    DbRow {
        inference_provider: "Groq".into(),
        model_provider: "Meta".into(),
        human_readable_name: name.into(),
        provider_slug: name.to_lowercase().replace(' ', "-"),
        model_provider_country: "United States".into(),
        official_url: "https://ai.meta.com".into(),
        input_modalities: "Text".into(),
        output_modalities: "Text".into(),
        license_info_text: String::new(),
        license_info_url: String::new(),
        license_name: license_name.into(),
        license_url: String::new(),
        rate_limits: "30 RPM".into(),
        provider_api_access: String::new(),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
#[ignore]
async fn test_refresh_zero_rows_commits_empty_slice() {
    let store = setup().await;

    let seed: Vec<DbRow> = (0..3).map(|i| row(&format!("Seed {i}"), "MIT")).collect();
    let outcome = refresh_slice(&store, TEST_TABLE, "Groq", &seed, 100)
        .await
        .unwrap();
    assert_eq!(outcome.state, RefreshState::Done);

    // Refreshing with nothing prepared empties the slice; no rollback.
    let outcome = refresh_slice(&store, TEST_TABLE, "Groq", &[], 100)
        .await
        .unwrap();
    assert_eq!(outcome.state, RefreshState::Done);
    assert_eq!(outcome.final_count, 0);
}

#[tokio::test]
#[ignore]
async fn test_refresh_twice_is_idempotent() {
    let store = setup().await;
    let rows: Vec<DbRow> = (0..7).map(|i| row(&format!("Model {i}"), "MIT")).collect();

    let first = refresh_slice(&store, TEST_TABLE, "Groq", &rows, 100)
        .await
        .unwrap();
    assert_eq!(first.state, RefreshState::Done);
    assert_eq!(first.final_count, 7);

    let second = refresh_slice(&store, TEST_TABLE, "Groq", &rows, 100)
        .await
        .unwrap();
    assert_eq!(second.state, RefreshState::Done);
    assert_eq!(second.final_count, 7);
    assert_eq!(second.initial_count, 7);
    assert_eq!(second.backed_up, 7);
}

#[tokio::test]
#[ignore]
async fn test_failed_insert_restores_backup() {
    let store = setup().await;

    // Seed 10 good rows.
    let seed: Vec<DbRow> = (0..10).map(|i| row(&format!("Good {i}"), "MIT")).collect();
    let outcome = refresh_slice(&store, TEST_TABLE, "Groq", &seed, 100)
        .await
        .unwrap();
    assert_eq!(outcome.state, RefreshState::Done);

    // 150 rows with a poison value in the second batch of 100.
    let mut prepared: Vec<DbRow> = (0..150).map(|i| row(&format!("New {i}"), "MIT")).collect();
    prepared[120].license_name = "poison".into();

    let outcome = refresh_slice(&store, TEST_TABLE, "Groq", &prepared, 100)
        .await
        .unwrap();
    assert_eq!(outcome.state, RefreshState::RestoredFromBackup);

    // The slice equals the backup again.
    let count = store.count_slice(TEST_TABLE, "Groq").await.unwrap();
    assert_eq!(count, 10);
    let restored = store.read_slice(TEST_TABLE, "Groq").await.unwrap();
    let mut names: Vec<String> = restored
        .iter()
        .map(|r| r.human_readable_name.clone().unwrap_or_default())
        .collect();
    names.sort();
    assert!(names.iter().all(|n| n.starts_with("Good ")));
}

#[tokio::test]
#[ignore]
async fn test_slice_isolation_between_providers() {
    let store = setup().await;

    let groq: Vec<DbRow> = (0..4).map(|i| row(&format!("Groq {i}"), "MIT")).collect();
    refresh_slice(&store, TEST_TABLE, "Groq", &groq, 100)
        .await
        .unwrap();

    let mut other = row("Google 0", "MIT");
    other.inference_provider = "Google".into();
    refresh_slice(&store, TEST_TABLE, "Google", &[other], 100)
        .await
        .unwrap();

    // Refreshing Groq again must not disturb the Google slice.
    refresh_slice(&store, TEST_TABLE, "Groq", &groq[..2], 100)
        .await
        .unwrap();
    assert_eq!(store.count_slice(TEST_TABLE, "Google").await.unwrap(), 1);
    assert_eq!(store.count_slice(TEST_TABLE, "Groq").await.unwrap(), 2);
}
