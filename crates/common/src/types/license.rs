use serde::{Deserialize, Serialize};

/// How a model's license identity was classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseCategory {
    Proprietary,
    Opensource,
    Custom,
    Unknown,
}

impl LicenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proprietary => "proprietary",
            Self::Opensource => "opensource",
            Self::Custom => "custom",
            Self::Unknown => "unknown",
        }
    }
}

/// Which fallback produced a license URL during the tiered probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlTier {
    OfficialOverride,
    LicenseFile,
    ReadmeFile,
    BaseRepository,
    Inaccessible,
}

impl UrlTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfficialOverride => "Official override",
            Self::LicenseFile => "LICENSE file",
            Self::ReadmeFile => "README.md file",
            Self::BaseRepository => "Base repository",
            Self::Inaccessible => "Inaccessible",
        }
    }
}

/// Resolved license identity for a model.
///
/// `license_info_text` is "info" exactly when `license_info_url` is non-empty.
/// Custom and unknown rows leave both info fields empty.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LicenseFact {
    pub category: LicenseCategory,
    /// Standardized short name, or "Unknown".
    pub license_name: String,
    /// Authoritative URL, or a URL-type fallback, or "Unknown".
    pub license_url: String,
    #[serde(default)]
    pub license_info_text: String,
    #[serde(default)]
    pub license_info_url: String,
}

impl LicenseFact {
    pub fn unknown() -> Self {
        Self {
            category: LicenseCategory::Unknown,
            license_name: "Unknown".to_string(),
            license_url: "Unknown".to_string(),
            license_info_text: String::new(),
            license_info_url: String::new(),
        }
    }

    /// The info-field pairing rule every fact must satisfy.
    pub fn info_fields_consistent(&self) -> bool {
        (self.license_info_text == "info") == !self.license_info_url.is_empty()
            && (self.license_info_text.is_empty() || self.license_info_text == "info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fact_is_consistent() {
        let fact = LicenseFact::unknown();
        assert!(fact.info_fields_consistent());
        assert_eq!(fact.category, LicenseCategory::Unknown);
    }

    #[test]
    fn test_info_pairing() {
        let mut fact = LicenseFact::unknown();
        fact.license_info_text = "info".into();
        assert!(!fact.info_fields_consistent());
        fact.license_info_url = "https://example.com".into();
        assert!(fact.info_fields_consistent());
    }
}
