use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration, deserialized from pipeline.toml.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub http: HttpConfig,
    pub scrape: ScrapeConfig,
    pub db: DbConfig,
    pub orchestrator: OrchestratorConfig,
    /// Ordered stage plan per provider key ("google", "groq", "openrouter").
    pub providers: HashMap<String, ProviderPlan>,
}

/// HTTP client parameters shared by every extractor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Browser-like default user agent for documentation scrapes.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout for GET calls.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Timeout for HEAD accessibility probes.
    #[serde(default = "default_head_timeout_seconds")]
    pub head_timeout_seconds: u64,
    /// Attempts per request (first try included).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between retry attempts.
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    /// Base for exponential 429 backoff, when a call site opts in.
    #[serde(default = "default_backoff_base_seconds")]
    pub backoff_base_seconds: u64,
    /// Token-bucket rate per domain (requests per second).
    #[serde(default = "default_rate_limit_per_second")]
    pub rate_limit_per_second: f64,
    /// Hosts that must resolve to IPv4 (first A record pinned at client
    /// build; TLS verification stays name-based).
    #[serde(default)]
    pub ipv4_hosts: Vec<String>,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_head_timeout_seconds() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    2
}

fn default_backoff_base_seconds() -> u64 {
    5
}

fn default_rate_limit_per_second() -> f64 {
    2.0
}

/// Documentation-scraping parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Quality gate: below this many scraped models the previous artifact
    /// is preserved instead of overwritten.
    #[serde(default = "default_min_expected_models")]
    pub min_expected_models: usize,
    /// Attempts to wait out dynamically populated rate-limit tables.
    #[serde(default = "default_rate_limits_max_attempts")]
    pub rate_limits_max_attempts: u32,
    #[serde(default = "default_rate_limits_retry_delay_seconds")]
    pub rate_limits_retry_delay_seconds: u64,
    /// Pause between per-model detail-page fetches.
    #[serde(default = "default_model_page_delay_ms")]
    pub model_page_delay_ms: u64,
    /// Fan-out width for embarrassingly parallel documentation scrapes.
    #[serde(default = "default_scrape_concurrency")]
    pub concurrency: usize,
}

fn default_min_expected_models() -> usize {
    15
}

fn default_rate_limits_max_attempts() -> u32 {
    5
}

fn default_rate_limits_retry_delay_seconds() -> u64 {
    3
}

fn default_model_page_delay_ms() -> u64 {
    1000
}

fn default_scrape_concurrency() -> usize {
    4
}

/// Database targets and sync parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_working_table")]
    pub working_table: String,
    #[serde(default = "default_production_table")]
    pub production_table: String,
    #[serde(default = "default_rate_limits_table")]
    pub rate_limits_table: String,
    #[serde(default = "default_mapping_table")]
    pub mapping_table: String,
    #[serde(default = "default_metrics_table")]
    pub metrics_table: String,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Promotion count-verify tolerance as a fraction of prepared rows.
    #[serde(default = "default_promote_tolerance")]
    pub promote_tolerance: f64,
}

fn default_working_table() -> String {
    "public.working_version".to_string()
}

fn default_production_table() -> String {
    "public.ai_models_main".to_string()
}

fn default_rate_limits_table() -> String {
    "ims.\"30_rate_limits\"".to_string()
}

fn default_mapping_table() -> String {
    "ims.\"10_model_aa_mapping\"".to_string()
}

fn default_metrics_table() -> String {
    "ims.\"20_aa_performance_metrics\"".to_string()
}

fn default_insert_batch_size() -> usize {
    100
}

fn default_max_connections() -> u32 {
    5
}

fn default_promote_tolerance() -> f64 {
    0.05
}

/// Orchestrator-level limits and output locations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Watchdog ceiling per stage.
    #[serde(default = "default_stage_timeout_minutes")]
    pub stage_timeout_minutes: u64,
    /// Root directory for per-provider artifact outputs.
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: String,
}

fn default_stage_timeout_minutes() -> u64 {
    15
}

fn default_outputs_dir() -> String {
    "outputs".to_string()
}

/// Ordered stage list for one provider pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderPlan {
    pub stages: Vec<StageConfig>,
}

/// One orchestrated stage, keyed by its selection letter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageConfig {
    /// Single selection letter (A, B, ...), unique within a provider plan.
    pub letter: String,
    pub kind: StageKind,
    /// Required-stage failure aborts the pipeline; optional failure logs
    /// and continues.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Whether `--auto-all` (and non-interactive mode) selects this stage.
    #[serde(default = "default_true")]
    pub auto: bool,
}

fn default_true() -> bool {
    true
}

/// The closed set of orchestratable stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    FetchApiModels,
    FilterModels,
    ScrapeModels,
    ScrapeRateLimits,
    ScrapeModalities,
    ResolveLicenses,
    NormalizeModalities,
    FuseRecords,
    CompareWorking,
    RefreshWorking,
    RefreshMapping,
    PromoteProduction,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchApiModels => "fetch-api-models",
            Self::FilterModels => "filter-models",
            Self::ScrapeModels => "scrape-models",
            Self::ScrapeRateLimits => "scrape-rate-limits",
            Self::ScrapeModalities => "scrape-modalities",
            Self::ResolveLicenses => "resolve-licenses",
            Self::NormalizeModalities => "normalize-modalities",
            Self::FuseRecords => "fuse-records",
            Self::CompareWorking => "compare-working",
            Self::RefreshWorking => "refresh-working",
            Self::RefreshMapping => "refresh-mapping",
            Self::PromoteProduction => "promote-production",
        }
    }
}

/// OpenRouter sequential filtering rules (filters.json).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterRules {
    pub free_model_criteria: FreeModelCriteria,
    #[serde(default)]
    pub billing_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_reasons: HashMap<String, String>,
    #[serde(default)]
    pub deduplication: DedupRules,
}

/// The literal pricing strings that mark a model as free.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FreeModelCriteria {
    pub pricing_prompt: String,
    pub pricing_completion: String,
    pub pricing_request: String,
}

impl Default for FreeModelCriteria {
    fn default() -> Self {
        Self {
            pricing_prompt: "0".to_string(),
            pricing_completion: "0".to_string(),
            pricing_request: "0".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DedupRules {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Keep the survivor carrying the " (free)" suffix.
    #[serde(default = "default_true")]
    pub keep_free_suffix: bool,
}

impl Default for DedupRules {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_free_suffix: true,
        }
    }
}

/// Curated license tables (licenses.json).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LicenseTables {
    /// Exact canonical-slug assignments (resolution priority 1).
    #[serde(default)]
    pub proprietary: HashMap<String, LicenseAssignment>,
    /// Google sub-pattern assignments, keyed "gemini"/"gemma" (priority 2).
    #[serde(default)]
    pub google: HashMap<String, LicenseAssignment>,
    /// Meta assignment for meta-llama/llama models (priority 3).
    #[serde(default)]
    pub meta: Option<LicenseAssignment>,
    /// Case-insensitive raw-name standardization.
    #[serde(default)]
    pub standardization: HashMap<String, String>,
    /// Curated opensource license-name to authoritative-URL table.
    #[serde(default)]
    pub opensource_urls: HashMap<String, String>,
    /// Custom-category URL overrides by standardized license name.
    #[serde(default)]
    pub custom_url_overrides: HashMap<String, String>,
}

/// A fully specified license outcome from a curated mapping.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LicenseAssignment {
    pub license_name: String,
    pub license_url: String,
    #[serde(default)]
    pub license_info_text: String,
    #[serde(default)]
    pub license_info_url: String,
}

/// Modality standardization tables (modalities.json).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModalityTables {
    /// Lowercase raw token to canonical token.
    #[serde(default)]
    pub mappings: HashMap<String, String>,
    /// Canonical token to sort priority (lower sorts first).
    #[serde(default)]
    pub ordering_priority: HashMap<String, i32>,
    /// Per-model overrides keyed by canonical slug; highest precedence.
    #[serde(default)]
    pub overrides: HashMap<String, ModalityOverride>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModalityOverride {
    pub input_modalities: Vec<String>,
    pub output_modalities: Vec<String>,
}

/// Provider enrichment tables (providers.json).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProviderTables {
    /// Canonical-slug prefix to `[display name, country]`.
    #[serde(default)]
    pub provider_mappings: HashMap<String, (String, String)>,
    /// Google model families to slug prefixes (family pattern matching).
    #[serde(default)]
    pub model_family_patterns: HashMap<String, Vec<String>>,
    /// Family or provider key to official URL.
    #[serde(default)]
    pub official_urls: HashMap<String, String>,
    /// Inference-provider key to API access URL.
    #[serde(default)]
    pub api_access_urls: HashMap<String, String>,
    /// Inference-provider key to default rate-limit text.
    #[serde(default)]
    pub default_rate_limits: HashMap<String, String>,
    /// Lowercased display name to substituted display name.
    #[serde(default)]
    pub special_name_substitutions: HashMap<String, String>,
    /// Canonical slugs removed by operator policy after fusion.
    #[serde(default)]
    pub removal_list: Vec<String>,
}

/// Scrape and API URL sets (sources.json). The URL set is configuration,
/// not code.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceUrls {
    pub google: GoogleSources,
    pub groq: GroqSources,
    pub openrouter: OpenRouterSources,
    pub huggingface: HuggingFaceSources,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GoogleSources {
    /// REST base; the models list is `{api_base}/v1beta/models`.
    pub api_base: String,
    /// Documentation pages keyed by page name (gemini, imagen, video,
    /// gemma3, gemma2, gemma3n).
    #[serde(default)]
    pub docs_pages: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroqSources {
    pub models_page: String,
    pub rate_limits_page: String,
    /// Template with `{model_id}` placeholder.
    pub model_details_template: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OpenRouterSources {
    pub models_endpoint: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HuggingFaceSources {
    /// Hub metadata API base; repo metadata is `{api_base}/models/{repo}`.
    pub api_base: String,
    /// Public page base; repo pages are `{page_base}/{repo}`.
    pub page_base: String,
}

impl HuggingFaceSources {
    pub fn repo_url(&self, hf_id: &str) -> String {
        format!("{}/{}", self.page_base.trim_end_matches('/'), hf_id)
    }

    pub fn license_file_url(&self, hf_id: &str) -> String {
        format!("{}/blob/main/LICENSE", self.repo_url(hf_id))
    }

    pub fn readme_url(&self, hf_id: &str) -> String {
        format!("{}/blob/main/README.md", self.repo_url(hf_id))
    }

    pub fn metadata_url(&self, hf_id: &str) -> String {
        format!("{}/models/{}", self.api_base.trim_end_matches('/'), hf_id)
    }
}
