pub mod google;
pub mod groq;
pub mod openrouter;

use std::collections::HashMap;

use catalog_common::types::RawModel;
use serde::{Deserialize, Serialize};

/// One scraped modality entry: the artifact row shape shared by the
/// documentation-scrape stages. The key is a normalized panel id
/// (`gemini-2.5-flash`), a family display name (`Gemma 3`), or a model
/// slug, depending on the provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapedModality {
    pub key: String,
    pub input_modalities: Vec<String>,
    pub output_modalities: Vec<String>,
}

/// What every provider extractor hands downstream. All maps are keyed by
/// canonical slug, the fusion key.
#[derive(Clone, Debug, Default)]
pub struct ExtractOutcome {
    pub raw_models: Vec<RawModel>,
    /// Scraped modality token lists per model: (inputs, outputs), raw,
    /// before standardization.
    pub modalities: HashMap<String, (Vec<String>, Vec<String>)>,
    /// Raw multiline rate-limit strings per model.
    pub rate_limits: HashMap<String, String>,
    /// Human-readable error lines, preserved verbatim into reports.
    pub diagnostics: Vec<String>,
}

impl ExtractOutcome {
    /// Deterministic emission order regardless of fetch completion order.
    pub fn sort_models(&mut self) {
        self.raw_models
            .sort_by(|a, b| a.canonical_slug.cmp(&b.canonical_slug));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}
