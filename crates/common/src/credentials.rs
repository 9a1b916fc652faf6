use crate::error::{CatalogError, Result};

/// Secrets and connection strings, read once at startup and passed
/// explicitly through every component. No process-wide singletons.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    /// PostgreSQL DSN for the pipeline-writer role.
    pub database_url: Option<String>,
    pub google_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
    /// Secret-store coordinates, when API keys should resolve store-first.
    pub secret_store_url: Option<String>,
    pub secret_store_key: Option<String>,
    /// Set when GITHUB_ACTIONS, CI, or AUTOMATED_EXECUTION is present.
    pub non_interactive: bool,
}

impl Credentials {
    /// Read everything from the process environment. Secret-store lookups
    /// (which need HTTP) happen later, in the engine bootstrap.
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let non_interactive = ["GITHUB_ACTIONS", "CI", "AUTOMATED_EXECUTION"]
            .iter()
            .any(|name| {
                std::env::var(name)
                    .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
                    .unwrap_or(false)
            });

        Self {
            database_url: env("PIPELINE_SUPABASE_URL"),
            google_api_key: env("GOOGLE_API_KEY"),
            openrouter_api_key: env("OPENROUTER_API_KEY"),
            groq_api_key: env("GROQ_API_KEY"),
            huggingface_api_key: env("HUGGINGFACE_API_KEY"),
            secret_store_url: env("SUPABASE_URL"),
            // SUPABASE_KEY accepted as a legacy alias.
            secret_store_key: env("SUPABASE_ANON_KEY").or_else(|| env("SUPABASE_KEY")),
            non_interactive,
        }
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CatalogError::Config("Missing required environment variable: PIPELINE_SUPABASE_URL".into())
        })
    }

    pub fn api_key_for(&self, provider_key: &str) -> Option<&str> {
        match provider_key {
            "google" => self.google_api_key.as_deref(),
            "openrouter" => self.openrouter_api_key.as_deref(),
            "groq" => self.groq_api_key.as_deref(),
            "huggingface" => self.huggingface_api_key.as_deref(),
            _ => None,
        }
    }

    pub fn set_api_key(&mut self, provider_key: &str, value: String) {
        match provider_key {
            "google" => self.google_api_key = Some(value),
            "openrouter" => self.openrouter_api_key = Some(value),
            "groq" => self.groq_api_key = Some(value),
            "huggingface" => self.huggingface_api_key = Some(value),
            _ => {}
        }
    }
}
