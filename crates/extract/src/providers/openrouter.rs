use catalog_common::config::{FilterRules, OpenRouterSources};
use catalog_common::types::{RawModel, SourceSection};
use catalog_fetch::FetchClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ExtractError, ExtractOutcome};

/// OpenRouter models endpoint payload.
#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    pub data: Vec<ApiModel>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiModel {
    pub id: String,
    #[serde(default)]
    pub canonical_slug: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub architecture: Option<Architecture>,
    #[serde(default)]
    pub hugging_face_id: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub context_length: Option<i64>,
}

impl ApiModel {
    /// Canonical slug: the published one, else the id with any `:variant`
    /// qualifier removed.
    pub fn canonical(&self) -> String {
        match &self.canonical_slug {
            Some(slug) if !slug.is_empty() => slug.clone(),
            _ => self.id.split(':').next().unwrap_or(&self.id).to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub completion: String,
    #[serde(default)]
    pub request: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Architecture {
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
}

/// Per-step exclusions from the sequential filter, `(model name, reason)`
/// pairs preserved for the stage report.
#[derive(Clone, Debug, Default)]
pub struct FilterBreakdown {
    pub pricing: Vec<(String, String)>,
    pub billing: Vec<(String, String)>,
    pub keywords: Vec<(String, String)>,
    pub deduplication: Vec<(String, String)>,
}

impl FilterBreakdown {
    pub fn total_excluded(&self) -> usize {
        self.pricing.len() + self.billing.len() + self.keywords.len() + self.deduplication.len()
    }
}

/// Fetch the models list with bearer authorization.
pub async fn fetch_models(
    fetch: &FetchClient,
    sources: &OpenRouterSources,
    api_key: &str,
) -> Result<Vec<ApiModel>, ExtractError> {
    let response: ModelsResponse = fetch
        .get_json(&sources.models_endpoint, Some(api_key))
        .await
        .map_err(|e| ExtractError::Api(e.to_string()))?;

    tracing::info!(models = response.data.len(), "OpenRouter models fetched");
    Ok(response.data)
}

/// Sequential, reportable filtering: free pricing, billing description,
/// exclusion keywords, then " (free)" deduplication.
pub fn filter_models(
    models: Vec<ApiModel>,
    rules: &FilterRules,
) -> (Vec<ApiModel>, FilterBreakdown) {
    let mut breakdown = FilterBreakdown::default();
    let criteria = &rules.free_model_criteria;

    // Step 1: free pricing.
    let (step1, excluded): (Vec<_>, Vec<_>) = models.into_iter().partition(|m| {
        m.pricing.prompt == criteria.pricing_prompt
            && m.pricing.completion == criteria.pricing_completion
            && m.pricing.request == criteria.pricing_request
    });
    breakdown.pricing = excluded
        .into_iter()
        .map(|m| (m.name, "Requires billing/payment".to_string()))
        .collect();

    // Step 2: billing keywords in the description.
    let mut step2 = Vec::new();
    for model in step1 {
        let description = model.description.to_lowercase();
        match rules
            .billing_keywords
            .iter()
            .find(|keyword| description.contains(&keyword.to_lowercase()))
        {
            Some(keyword) => breakdown.billing.push((
                model.name.clone(),
                format!("Description indicates billing requirements: '{keyword}'"),
            )),
            None => step2.push(model),
        }
    }

    // Step 3: exclusion keywords in the model name.
    let mut step3 = Vec::new();
    for model in step2 {
        let name_lower = model.name.to_lowercase();
        match rules
            .exclude_keywords
            .iter()
            .find(|keyword| name_lower.contains(&keyword.to_lowercase()))
        {
            Some(keyword) => {
                let reason = rules
                    .exclude_reasons
                    .get(keyword)
                    .cloned()
                    .unwrap_or_else(|| format!("Contains excluded keyword: {keyword}"));
                breakdown.keywords.push((model.name.clone(), reason));
            }
            None => step3.push(model),
        }
    }

    // Step 4: dedup after " (free)" suffix normalization.
    let step4 = if rules.deduplication.enabled {
        dedup_free_suffix(step3, rules.deduplication.keep_free_suffix, &mut breakdown)
    } else {
        step3
    };

    tracing::info!(
        passed = step4.len(),
        excluded = breakdown.total_excluded(),
        "OpenRouter sequential filtering complete"
    );
    (step4, breakdown)
}

fn dedup_free_suffix(
    models: Vec<ApiModel>,
    keep_free_suffix: bool,
    breakdown: &mut FilterBreakdown,
) -> Vec<ApiModel> {
    let mut groups: Vec<(String, Vec<ApiModel>)> = Vec::new();
    for model in models {
        let normalized = model.name.replace(" (free)", "").trim().to_string();
        match groups.iter_mut().find(|(key, _)| *key == normalized) {
            Some((_, group)) => group.push(model),
            None => groups.push((normalized, vec![model])),
        }
    }

    let mut kept = Vec::new();
    for (_, mut group) in groups {
        if group.len() == 1 {
            kept.push(group.pop().expect("non-empty group"));
            continue;
        }

        let keep_index = if keep_free_suffix {
            group
                .iter()
                .position(|m| m.name.contains(" (free)"))
                .unwrap_or(0)
        } else {
            0
        };
        let survivor = group.remove(keep_index);
        for dropped in group {
            breakdown.deduplication.push((
                dropped.name,
                "Duplicate model after (free) suffix normalization".to_string(),
            ));
        }
        kept.push(survivor);
    }
    kept
}

/// Turn filtered API models into the provider-agnostic extract outcome.
pub fn to_outcome(models: &[ApiModel]) -> ExtractOutcome {
    let mut outcome = ExtractOutcome::default();

    for model in models {
        let canonical = model.canonical();
        let mut raw = RawModel::new(
            model.id.clone(),
            canonical.clone(),
            model.name.clone(),
            SourceSection::Api,
        );
        raw.created_at_source = model
            .created
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        raw.context_window = model.context_length;
        raw.hugging_face_id = model
            .hugging_face_id
            .clone()
            .filter(|id| !id.trim().is_empty());

        if let Some(architecture) = &model.architecture {
            raw.raw_modalities_in = lowercase_all(&architecture.input_modalities);
            raw.raw_modalities_out = lowercase_all(&architecture.output_modalities);
        }

        outcome.raw_models.push(raw);
    }

    outcome.sort_models();
    outcome
}

fn lowercase_all(tokens: &[String]) -> Vec<String> {
    tokens.iter().map(|t| t.trim().to_lowercase()).collect()
}

/// Render the sequential filter report body.
pub fn filter_report(total: usize, kept: usize, breakdown: &FilterBreakdown) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(80));
    out.push_str("\nOPENROUTER MODELS SEQUENTIAL FILTER REPORT\n");
    out.push_str(&"=".repeat(80));
    out.push_str(&format!(
        "\n\nTotal models processed: {total}\nModels passed all filters: {kept}\nModels excluded: {}\n\n",
        breakdown.total_excluded()
    ));

    let steps: [(&str, &Vec<(String, String)>); 4] = [
        ("Step 1 - Free Pricing Filter", &breakdown.pricing),
        ("Step 2 - Billing Description Filter", &breakdown.billing),
        ("Step 3 - Keyword Filter", &breakdown.keywords),
        ("Step 4 - Deduplication Filter", &breakdown.deduplication),
    ];
    for (title, exclusions) in steps {
        out.push_str(&format!("{title}: {} excluded\n", exclusions.len()));
        for (index, (name, reason)) in exclusions.iter().enumerate() {
            out.push_str(&format!("  {:2}. {name}\n      Reason: {reason}\n", index + 1));
        }
        out.push('\n');
    }
    out
}
