use std::collections::HashSet;

use catalog_common::config::StageKind;
use catalog_common::types::InferenceProvider;

use super::loader::{ConfigError, EngineConfig};

/// Cross-field checks the type system cannot express. Runs once at load.
pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    for (provider_key, plan) in &config.pipeline.providers {
        let provider = InferenceProvider::parse(provider_key).ok_or_else(|| {
            ConfigError::Validation(format!("Unknown provider key '{provider_key}' in pipeline.toml"))
        })?;

        if plan.stages.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Provider '{provider_key}' has an empty stage plan"
            )));
        }

        let mut letters = HashSet::new();
        for stage in &plan.stages {
            if stage.letter.len() != 1 || !stage.letter.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ConfigError::Validation(format!(
                    "Stage letter '{}' for '{provider_key}' must be a single uppercase letter",
                    stage.letter
                )));
            }
            if !letters.insert(stage.letter.clone()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate stage letter '{}' for provider '{provider_key}'",
                    stage.letter
                )));
            }
        }

        // Every plan needs a model-list source stage before anything that
        // consumes raw models.
        let has_source = plan.stages.iter().any(|s| {
            matches!(s.kind, StageKind::FetchApiModels | StageKind::ScrapeModels)
        });
        if !has_source {
            return Err(ConfigError::Validation(format!(
                "Provider '{provider_key}' has no fetch-api-models or scrape-models stage"
            )));
        }

        // Source URL sanity per provider.
        let url_missing = match provider {
            InferenceProvider::Google => config.sources.google.api_base.is_empty(),
            InferenceProvider::Groq => config.sources.groq.models_page.is_empty(),
            InferenceProvider::OpenRouter => config.sources.openrouter.models_endpoint.is_empty(),
        };
        if url_missing {
            return Err(ConfigError::Validation(format!(
                "Provider '{provider_key}' is planned but its source URL is empty in sources.json"
            )));
        }
    }

    if config.modalities.mappings.is_empty() {
        return Err(ConfigError::Validation(
            "modalities.json has an empty mappings table".to_string(),
        ));
    }
    if config.modalities.ordering_priority.is_empty() {
        return Err(ConfigError::Validation(
            "modalities.json has an empty ordering_priority table".to_string(),
        ));
    }

    // Curated license assignments must satisfy the info-field pairing rule.
    let assignments = config
        .licenses
        .proprietary
        .values()
        .chain(config.licenses.google.values())
        .chain(config.licenses.meta.iter());
    for assignment in assignments {
        let has_info = assignment.license_info_text == "info";
        let has_url = !assignment.license_info_url.is_empty();
        if has_info != has_url {
            return Err(ConfigError::Validation(format!(
                "License assignment '{}' pairs license_info_text='{}' with license_info_url='{}'",
                assignment.license_name, assignment.license_info_text, assignment.license_info_url
            )));
        }
        if !assignment.license_info_text.is_empty() && assignment.license_info_text != "info" {
            return Err(ConfigError::Validation(format!(
                "License assignment '{}' has license_info_text '{}'; only \"\" or \"info\" are legal",
                assignment.license_name, assignment.license_info_text
            )));
        }
    }

    if config.filters.free_model_criteria.pricing_prompt.is_empty() {
        return Err(ConfigError::Validation(
            "filters.json free_model_criteria.pricing_prompt is empty".to_string(),
        ));
    }

    Ok(())
}
