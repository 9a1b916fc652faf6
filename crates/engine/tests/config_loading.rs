//! The shipped config directory must load and validate as-is; a broken
//! table should refuse to start the engine.

use std::path::Path;

use catalog_engine::config::load_config;

#[test]
fn test_shipped_config_loads() {
    let config = load_config(Path::new("../../config")).expect("shipped config must load");

    assert_eq!(config.pipeline.providers.len(), 3);
    for key in ["google", "groq", "openrouter"] {
        assert!(
            config.pipeline.providers.contains_key(key),
            "missing stage plan for {key}"
        );
    }

    // Every stage plan starts with a model-list source.
    for plan in config.pipeline.providers.values() {
        assert!(!plan.stages.is_empty());
    }

    assert!(!config.modalities.mappings.is_empty());
    assert!(!config.licenses.opensource_urls.is_empty());
    assert!(config.licenses.meta.is_some());
    assert!(!config.sources.huggingface.page_base.is_empty());
}

#[test]
fn test_missing_config_dir_fails() {
    let error = load_config(Path::new("../../no-such-config")).unwrap_err();
    assert!(error.to_string().contains("Failed to read"));
}

#[test]
fn test_invalid_stage_letter_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path();

    // Copy the shipped JSON tables; break only the stage plan.
    for file in [
        "filters.json",
        "licenses.json",
        "modalities.json",
        "providers.json",
        "sources.json",
    ] {
        std::fs::copy(Path::new("../../config").join(file), config_dir.join(file)).unwrap();
    }
    std::fs::write(
        config_dir.join("pipeline.toml"),
        r#"
[http]
[scrape]
[db]
[orchestrator]

[providers.groq]
stages = [ { letter = "AA", kind = "scrape-models" } ]
"#,
    )
    .unwrap();

    let error = load_config(config_dir).unwrap_err();
    assert!(error.to_string().contains("single uppercase letter"));
}
