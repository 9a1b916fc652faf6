use std::collections::HashMap;

use catalog_common::config::ProviderTables;
use catalog_common::types::{
    DbRow, InferenceProvider, LicenseFact, ModalityFact, ProviderFact, RawModel,
};
use chrono::Utc;

use crate::names;

/// Attribute sources fused into one DbRow per canonical slug. Every map is
/// keyed by canonical slug.
pub struct FuseInputs<'a> {
    pub provider: InferenceProvider,
    pub raw_models: &'a [RawModel],
    pub licenses: &'a HashMap<String, LicenseFact>,
    pub modalities: &'a HashMap<String, ModalityFact>,
    pub tables: &'a ProviderTables,
}

/// A row removed by operator policy, kept for the stage report.
#[derive(Clone, Debug)]
pub struct RemovedRow {
    pub canonical_slug: String,
    pub human_readable_name: String,
}

/// Fuse per-source partials into DbRows, applying the operator removal
/// list last. Output is ordered by canonical slug.
pub fn fuse(inputs: &FuseInputs<'_>) -> (Vec<DbRow>, Vec<RemovedRow>) {
    let now = Utc::now();
    let mut rows = Vec::new();
    let mut removed = Vec::new();

    let mut models: Vec<&RawModel> = inputs.raw_models.iter().collect();
    models.sort_by(|a, b| a.canonical_slug.cmp(&b.canonical_slug));

    for model in models {
        let slug = &model.canonical_slug;
        let human_readable_name = names::clean_display_name(
            &model.display_name,
            slug,
            &inputs.tables.special_name_substitutions,
        );

        if inputs.tables.removal_list.iter().any(|r| r == slug) {
            removed.push(RemovedRow {
                canonical_slug: slug.clone(),
                human_readable_name,
            });
            continue;
        }

        let provider_fact = resolve_provider_fact(slug, inputs.provider, inputs.tables);
        let license = inputs.licenses.get(slug);
        let modality = inputs.modalities.get(slug);

        let rate_limits = if model.raw_rate_limits.is_empty() {
            inputs
                .tables
                .default_rate_limits
                .get(inputs.provider.as_key())
                .cloned()
                .unwrap_or_default()
        } else {
            model.raw_rate_limits.clone()
        };

        rows.push(DbRow {
            inference_provider: inputs.provider.as_str().to_string(),
            model_provider: provider_fact.model_provider,
            human_readable_name,
            provider_slug: model.provider_slug.clone(),
            model_provider_country: provider_fact.model_provider_country,
            official_url: provider_fact.official_url,
            input_modalities: modality.map(|m| m.inputs_string()).unwrap_or_default(),
            output_modalities: modality.map(|m| m.outputs_string()).unwrap_or_default(),
            license_info_text: license.map(|l| l.license_info_text.clone()).unwrap_or_default(),
            license_info_url: license.map(|l| l.license_info_url.clone()).unwrap_or_default(),
            license_name: license.map(|l| l.license_name.clone()).unwrap_or_default(),
            license_url: license.map(|l| l.license_url.clone()).unwrap_or_default(),
            rate_limits,
            provider_api_access: provider_fact.provider_api_access,
            created_at: model.created_at_source.unwrap_or(now),
            updated_at: now,
        });
    }

    metrics::counter!("catalog.fuse.rows").increment(rows.len() as u64);
    (rows, removed)
}

/// Resolve static provider attributes from config: `[name, country]` by
/// slug prefix, official URL by Google family pattern or provider key.
/// Missing attributes become the "Unknown" sentinel, never empty.
pub fn resolve_provider_fact(
    canonical_slug: &str,
    provider: InferenceProvider,
    tables: &ProviderTables,
) -> ProviderFact {
    let prefix = canonical_slug
        .split('/')
        .next()
        .unwrap_or(canonical_slug)
        .to_lowercase();

    let (model_provider, model_provider_country) = tables
        .provider_mappings
        .get(&prefix)
        .cloned()
        .unwrap_or_else(|| ("Unknown".to_string(), "Unknown".to_string()));

    // Google rows appear as `google/<model>` (OpenRouter) or
    // `models/<model>` (the Google REST list); both use family URLs.
    let url_key = if prefix == "google" || prefix == "models" {
        google_family(canonical_slug, tables)
    } else {
        Some(model_provider.to_lowercase())
    };
    let official_url = url_key
        .and_then(|key| tables.official_urls.get(&key).cloned())
        .unwrap_or_else(|| "Unknown".to_string());

    let provider_api_access = tables
        .api_access_urls
        .get(provider.as_key())
        .cloned()
        .unwrap_or_default();

    ProviderFact {
        model_provider,
        model_provider_country,
        official_url,
        provider_api_access,
    }
}

/// Google model family by configured slug-prefix patterns.
fn google_family(canonical_slug: &str, tables: &ProviderTables) -> Option<String> {
    let model_part = canonical_slug
        .split_once('/')
        .map(|(_, rest)| rest)
        .unwrap_or(canonical_slug)
        .to_lowercase();

    for (family, patterns) in &tables.model_family_patterns {
        if patterns
            .iter()
            .any(|pattern| model_part.starts_with(&pattern.to_lowercase()))
        {
            return Some(family.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_common::types::{LicenseCategory, SourceSection};

    fn tables() -> ProviderTables {
        let mut tables = ProviderTables::default();
        tables.provider_mappings.insert(
            "meta-llama".to_string(),
            ("Meta".to_string(), "United States".to_string()),
        );
        tables.provider_mappings.insert(
            "google".to_string(),
            ("Google".to_string(), "United States".to_string()),
        );
        tables
            .model_family_patterns
            .insert("gemini".to_string(), vec!["gemini".to_string()]);
        tables
            .official_urls
            .insert("meta".to_string(), "https://ai.meta.com".to_string());
        tables
            .official_urls
            .insert("gemini".to_string(), "https://deepmind.google/models/gemini/".to_string());
        tables.api_access_urls.insert(
            "openrouter".to_string(),
            "https://openrouter.ai/settings/keys".to_string(),
        );
        tables.default_rate_limits.insert(
            "openrouter".to_string(),
            "20 requests per minute, 50 requests per day".to_string(),
        );
        tables
    }

    fn meta_raw_model() -> RawModel {
        let mut raw = RawModel::new(
            "meta-llama/llama-3.1-8b-instruct:free",
            "meta-llama/llama-3.1-8b-instruct",
            "Meta: Llama 3.1 8B Instruct (free)",
            SourceSection::Api,
        );
        raw.hugging_face_id = Some("meta-llama/Llama-3.1-8B-Instruct".to_string());
        raw
    }

    #[test]
    fn test_fuse_meta_record() {
        let raw_models = vec![meta_raw_model()];
        let mut licenses = HashMap::new();
        licenses.insert(
            "meta-llama/llama-3.1-8b-instruct".to_string(),
            LicenseFact {
                category: LicenseCategory::Proprietary,
                license_name: "Llama 3.1".to_string(),
                license_url: "https://www.llama.com/llama3_1/license/".to_string(),
                license_info_text: String::new(),
                license_info_url: String::new(),
            },
        );
        let mut modalities = HashMap::new();
        modalities.insert(
            "meta-llama/llama-3.1-8b-instruct".to_string(),
            ModalityFact::new(vec!["Text".to_string()], vec!["Text".to_string()]),
        );

        let tables = tables();
        let inputs = FuseInputs {
            provider: InferenceProvider::OpenRouter,
            raw_models: &raw_models,
            licenses: &licenses,
            modalities: &modalities,
            tables: &tables,
        };
        let (rows, removed) = fuse(&inputs);

        assert!(removed.is_empty());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.inference_provider, "OpenRouter");
        assert_eq!(row.model_provider, "Meta");
        assert_eq!(row.human_readable_name, "Llama 3.1 8B Instruct");
        assert_eq!(row.provider_slug, "llama-3.1-8b-instruct");
        assert_eq!(row.model_provider_country, "United States");
        assert_eq!(row.official_url, "https://ai.meta.com");
        assert_eq!(row.input_modalities, "Text");
        assert_eq!(row.output_modalities, "Text");
        assert_eq!(row.license_name, "Llama 3.1");
        assert_eq!(row.license_info_text, "");
        assert_eq!(row.rate_limits, "20 requests per minute, 50 requests per day");
        assert!(row.has_required_keys());
    }

    #[test]
    fn test_fuse_unknown_sentinels() {
        let raw_models = vec![RawModel::new(
            "mystery/model-x",
            "mystery/model-x",
            "Model X",
            SourceSection::Api,
        )];
        let licenses = HashMap::new();
        let modalities = HashMap::new();
        let tables = tables();
        let inputs = FuseInputs {
            provider: InferenceProvider::OpenRouter,
            raw_models: &raw_models,
            licenses: &licenses,
            modalities: &modalities,
            tables: &tables,
        };
        let (rows, _) = fuse(&inputs);

        let row = &rows[0];
        assert_eq!(row.model_provider, "Unknown");
        assert_eq!(row.model_provider_country, "Unknown");
        assert_eq!(row.official_url, "Unknown");
        // License optionals stay empty strings, never "Unknown".
        assert_eq!(row.license_name, "");
        assert_eq!(row.input_modalities, "");
    }

    #[test]
    fn test_fuse_removal_list() {
        let mut tables = tables();
        tables
            .removal_list
            .push("meta-llama/llama-3.1-8b-instruct".to_string());

        let raw_models = vec![meta_raw_model()];
        let licenses = HashMap::new();
        let modalities = HashMap::new();
        let inputs = FuseInputs {
            provider: InferenceProvider::OpenRouter,
            raw_models: &raw_models,
            licenses: &licenses,
            modalities: &modalities,
            tables: &tables,
        };
        let (rows, removed) = fuse(&inputs);

        assert!(rows.is_empty());
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].human_readable_name, "Llama 3.1 8B Instruct");
    }

    #[test]
    fn test_fuse_google_family_url() {
        let raw_models = vec![RawModel::new(
            "models/gemini-2.5-flash",
            "models/gemini-2.5-flash",
            "Gemini 2.5 Flash",
            SourceSection::Api,
        )];
        let licenses = HashMap::new();
        let modalities = HashMap::new();
        let mut tables = tables();
        tables.provider_mappings.insert(
            "models".to_string(),
            ("Google".to_string(), "United States".to_string()),
        );
        let inputs = FuseInputs {
            provider: InferenceProvider::Google,
            raw_models: &raw_models,
            licenses: &licenses,
            modalities: &modalities,
            tables: &tables,
        };
        let (rows, _) = fuse(&inputs);
        assert_eq!(rows[0].official_url, "https://deepmind.google/models/gemini/");
        assert_eq!(rows[0].model_provider, "Google");
    }

    #[test]
    fn test_fuse_output_sorted() {
        let raw_models = vec![
            RawModel::new("z", "z/model", "Z", SourceSection::Api),
            RawModel::new("a", "a/model", "A", SourceSection::Api),
        ];
        let licenses = HashMap::new();
        let modalities = HashMap::new();
        let tables = tables();
        let inputs = FuseInputs {
            provider: InferenceProvider::OpenRouter,
            raw_models: &raw_models,
            licenses: &licenses,
            modalities: &modalities,
            tables: &tables,
        };
        let (rows, _) = fuse(&inputs);
        assert_eq!(rows[0].provider_slug, "model");
        assert_eq!(rows[0].human_readable_name, "A");
        assert_eq!(rows[1].human_readable_name, "Z");
    }
}
