use std::path::{Path, PathBuf};

use catalog_common::config::{
    FilterRules, LicenseTables, ModalityTables, PipelineConfig, ProviderTables, SourceUrls,
};

use super::validation;

/// Complete engine configuration loaded from the config directory:
/// pipeline.toml for the ambient parameters plus the curated JSON tables.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub pipeline: PipelineConfig,
    pub filters: FilterRules,
    pub licenses: LicenseTables,
    pub modalities: ModalityTables,
    pub providers: ProviderTables,
    pub sources: SourceUrls,
    pub config_dir: PathBuf,
}

/// Load all configuration from the given config directory.
///
/// Fails loudly with clear messages; the pipeline refuses to start on a
/// validation failure.
pub fn load_config(config_dir: &Path) -> Result<EngineConfig, ConfigError> {
    tracing::info!(config_dir = %config_dir.display(), "Loading configuration");

    let pipeline = load_toml(&config_dir.join("pipeline.toml"))?;
    let filters = load_json(&config_dir.join("filters.json"))?;
    let licenses = load_json(&config_dir.join("licenses.json"))?;
    let modalities = load_json(&config_dir.join("modalities.json"))?;
    let providers = load_json(&config_dir.join("providers.json"))?;
    let sources = load_json(&config_dir.join("sources.json"))?;

    let config = EngineConfig {
        pipeline,
        filters,
        licenses,
        modalities,
        providers,
        sources,
        config_dir: config_dir.to_path_buf(),
    };

    validation::validate(&config)?;

    tracing::info!(
        providers = config.pipeline.providers.len(),
        license_mappings = config.licenses.standardization.len(),
        modality_mappings = config.modalities.mappings.len(),
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn load_toml(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}
