use std::collections::HashMap;

use catalog_common::config::HuggingFaceSources;
use catalog_common::types::UrlTier;
use catalog_fetch::FetchClient;

/// Authoritative URL for an opensource license name, from the curated
/// table only; opensource URLs are never probed.
pub fn opensource_url(license_name: &str, table: &HashMap<String, String>) -> Option<String> {
    if let Some(url) = table.get(license_name) {
        return Some(url.clone());
    }
    let lowered = license_name.to_lowercase();
    table
        .iter()
        .find(|(key, _)| key.to_lowercase() == lowered)
        .map(|(_, url)| url.clone())
}

/// Three-tier accessibility probe over a repo: LICENSE file, README.md,
/// then the repo root. HEAD requests only.
pub async fn probe_repo_urls(
    fetch: &FetchClient,
    sources: &HuggingFaceSources,
    hf_id: &str,
) -> (String, UrlTier) {
    if hf_id.trim().is_empty() {
        return ("Unknown".to_string(), UrlTier::Inaccessible);
    }

    let license_url = sources.license_file_url(hf_id);
    if fetch.accessible(&license_url).await {
        return (license_url, UrlTier::LicenseFile);
    }

    let readme_url = sources.readme_url(hf_id);
    if fetch.accessible(&readme_url).await {
        return (readme_url, UrlTier::ReadmeFile);
    }

    let repo_url = sources.repo_url(hf_id);
    if fetch.accessible(&repo_url).await {
        return (repo_url, UrlTier::BaseRepository);
    }

    ("Unknown".to_string(), UrlTier::Inaccessible)
}

/// License URL for a custom-category model: the curated override for the
/// license name when one exists, else the tiered repo probe.
pub async fn resolve_custom_url(
    fetch: &FetchClient,
    sources: &HuggingFaceSources,
    hf_id: &str,
    license_name: &str,
    overrides: &HashMap<String, String>,
) -> (String, UrlTier) {
    if let Some(url) = overrides.get(license_name) {
        return (url.clone(), UrlTier::OfficialOverride);
    }
    let lowered = license_name.to_lowercase();
    if let Some((_, url)) = overrides.iter().find(|(key, _)| key.to_lowercase() == lowered) {
        return (url.clone(), UrlTier::OfficialOverride);
    }

    probe_repo_urls(fetch, sources, hf_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opensource_url_case_insensitive() {
        let mut table = HashMap::new();
        table.insert(
            "Apache 2.0".to_string(),
            "https://www.apache.org/licenses/LICENSE-2.0".to_string(),
        );

        assert_eq!(
            opensource_url("Apache 2.0", &table).as_deref(),
            Some("https://www.apache.org/licenses/LICENSE-2.0")
        );
        assert_eq!(
            opensource_url("apache 2.0", &table).as_deref(),
            Some("https://www.apache.org/licenses/LICENSE-2.0")
        );
        assert!(opensource_url("MIT", &table).is_none());
    }
}
