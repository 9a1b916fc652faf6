use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fused row written to the working table.
///
/// Natural key is `(inference_provider, human_readable_name)`. The database
/// assigns `id`; the pipeline never sets it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbRow {
    pub inference_provider: String,
    pub model_provider: String,
    pub human_readable_name: String,
    pub provider_slug: String,
    pub model_provider_country: String,
    pub official_url: String,
    pub input_modalities: String,
    pub output_modalities: String,
    pub license_info_text: String,
    pub license_info_url: String,
    pub license_name: String,
    pub license_url: String,
    pub rate_limits: String,
    pub provider_api_access: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbRow {
    /// Column order used for working/production inserts.
    pub const COLUMNS: [&'static str; 16] = [
        "inference_provider",
        "model_provider",
        "human_readable_name",
        "provider_slug",
        "model_provider_country",
        "official_url",
        "input_modalities",
        "output_modalities",
        "license_info_text",
        "license_info_url",
        "license_name",
        "license_url",
        "rate_limits",
        "provider_api_access",
        "created_at",
        "updated_at",
    ];

    /// Non-empty key fields every emitted row must carry.
    pub fn has_required_keys(&self) -> bool {
        !self.inference_provider.is_empty()
            && !self.human_readable_name.is_empty()
            && !self.provider_slug.is_empty()
    }
}

/// Per-model rate limits, upserted keyed by `human_readable_name`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitRow {
    pub human_readable_name: String,
    pub inference_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpd: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpd: Option<i64>,
    pub raw_string: String,
    pub parseable: bool,
}

/// Provider-slug to performance-metric-slug cross reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingRow {
    pub inference_provider: String,
    /// Normalized provider slug (the upsert key together with the provider).
    pub provider_slug: String,
    pub aa_slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
