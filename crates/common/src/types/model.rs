use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of inference providers the pipeline understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InferenceProvider {
    Google,
    Groq,
    OpenRouter,
}

impl InferenceProvider {
    /// Display form used in database rows and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Groq => "Groq",
            Self::OpenRouter => "OpenRouter",
        }
    }

    /// Lowercase form used for config keys and output directories.
    pub fn as_key(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(Self::Google),
            "groq" => Some(Self::Groq),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }
}

impl std::fmt::Display for InferenceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the upstream surface a raw model was observed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceSection {
    Api,
    HtmlTable,
    HtmlExpandable,
    Config,
}

/// A provider-observed model before normalization.
///
/// Lives only in memory within one pipeline run; the canonical slug is the
/// fusion key for everything downstream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawModel {
    /// Opaque provider identifier (e.g. the REST `id` field).
    pub provider_id: String,
    /// Canonical slug as published (e.g. `meta-llama/llama-3.1-8b-instruct`).
    pub canonical_slug: String,
    /// Segment after the first `/` of the canonical slug.
    pub provider_slug: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_source: Option<DateTime<Utc>>,
    /// Lowercase modality tokens as published by the provider API.
    #[serde(default)]
    pub raw_modalities_in: Vec<String>,
    #[serde(default)]
    pub raw_modalities_out: Vec<String>,
    /// Free-form multiline rate-limit text as scraped or published.
    #[serde(default)]
    pub raw_rate_limits: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<i64>,
    /// HuggingFace repo id (`org/repo`) when the provider publishes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugging_face_id: Option<String>,
    pub source_section: SourceSection,
}

impl RawModel {
    pub fn new(
        provider_id: impl Into<String>,
        canonical_slug: impl Into<String>,
        display_name: impl Into<String>,
        source_section: SourceSection,
    ) -> Self {
        let canonical_slug = canonical_slug.into();
        let provider_slug = crate::types::provider_slug_of(&canonical_slug);
        Self {
            provider_id: provider_id.into(),
            canonical_slug,
            provider_slug,
            display_name: display_name.into(),
            created_at_source: None,
            raw_modalities_in: Vec::new(),
            raw_modalities_out: Vec::new(),
            raw_rate_limits: String::new(),
            context_window: None,
            max_completion_tokens: None,
            hugging_face_id: None,
            source_section,
        }
    }
}

/// Segment after the first `/` of a canonical slug, or the whole slug.
pub fn provider_slug_of(canonical_slug: &str) -> String {
    match canonical_slug.split_once('/') {
        Some((_, rest)) => rest.to_string(),
        None => canonical_slug.to_string(),
    }
}

/// Static provider attributes resolved from configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProviderFact {
    pub model_provider: String,
    pub model_provider_country: String,
    pub official_url: String,
    pub provider_api_access: String,
}
