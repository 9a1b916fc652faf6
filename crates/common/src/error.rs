use thiserror::Error;

/// Top-level error type for catalog pipeline operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    // --- Hard dependency errors (pipeline cannot proceed) ---
    #[error("PostgreSQL error: {0}")]
    Postgres(String),

    #[error("Provider API error: {0}")]
    ProviderApi(String),

    // --- Soft dependency errors (pipeline degrades to fallbacks) ---
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("License resolution error: {0}")]
    License(String),

    // --- Operational errors ---
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

impl CatalogError {
    /// Whether this error aborts a required pipeline stage.
    pub fn is_hard_dependency(&self) -> bool {
        matches!(self, Self::Postgres(_) | Self::ProviderApi(_))
    }

    /// Whether this error degrades the pipeline to heuristics/sentinels.
    pub fn is_soft_dependency(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Scrape(_) | Self::License(_))
    }
}

/// Result type alias for catalog pipeline operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
