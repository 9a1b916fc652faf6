use std::time::Duration;

use catalog_common::config::HuggingFaceSources;
use catalog_fetch::{extract_domain, DomainRateLimiter, FetchClient, UrlCache};
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;

/// Subset of the Hub model-metadata response the pipeline reads.
#[derive(Debug, Deserialize)]
struct RepoMetadata {
    #[serde(rename = "cardData")]
    card_data: Option<CardData>,
}

#[derive(Debug, Deserialize)]
struct CardData {
    license: Option<String>,
}

/// HuggingFace Hub access for license-name extraction.
///
/// All page fetches go through the per-domain limiter and a shared page
/// cache; the URL-tier probe and the name extractor often touch the same
/// repo page within one run.
pub struct HfClient<'a> {
    fetch: &'a FetchClient,
    limiter: &'a DomainRateLimiter,
    cache: &'a Mutex<UrlCache>,
    sources: &'a HuggingFaceSources,
    token: Option<String>,
}

impl<'a> HfClient<'a> {
    pub fn new(
        fetch: &'a FetchClient,
        limiter: &'a DomainRateLimiter,
        cache: &'a Mutex<UrlCache>,
        sources: &'a HuggingFaceSources,
        token: Option<String>,
    ) -> Self {
        Self {
            fetch,
            limiter,
            cache,
            sources,
            token,
        }
    }

    /// Extract a raw license name for a repo. The returned string may be an
    /// error-like marker (`HTTP 404`, `Error: …`) that standardization
    /// collapses to "Unknown"; this never aborts the pipeline.
    pub async fn extract_license_name(&self, hf_id: &str) -> String {
        if hf_id.trim().is_empty() {
            return "No HF ID".to_string();
        }

        let from_api = match self.card_license(hf_id).await {
            Ok(value) => value,
            Err(detail) => {
                tracing::warn!(hf_id = %hf_id, error = %detail, "Hub metadata API failed");
                return format!("Error: {detail}");
            }
        };

        match from_api.as_deref() {
            None => "Unknown".to_string(),
            // The Hub's literal `other` means the real name only exists on
            // the repo pages.
            Some("other") => {
                tracing::debug!(hf_id = %hf_id, "Hub reports 'other', scraping repo pages");
                self.scrape_license_name(hf_id).await
            }
            Some(value) => value.to_string(),
        }
    }

    /// `cardData.license` from the Hub metadata API.
    async fn card_license(&self, hf_id: &str) -> Result<Option<String>, String> {
        let url = self.sources.metadata_url(hf_id);
        self.acquire(&url).await;

        let metadata: RepoMetadata = self
            .fetch
            .get_json(&url, self.token.as_deref())
            .await
            .map_err(|e| e.to_string())?;

        Ok(metadata.card_data.and_then(|card| card.license))
    }

    /// Scrape an explicit license name off the repo pages: LICENSE file
    /// first, README on 404/429, repo root last.
    async fn scrape_license_name(&self, hf_id: &str) -> String {
        let urls = [
            self.sources.license_file_url(hf_id),
            self.sources.readme_url(hf_id),
            self.sources.repo_url(hf_id),
        ];

        let mut last_marker = "Unknown".to_string();
        for url in &urls {
            match self.fetch_page(url).await {
                Ok((200, body)) => {
                    if let Some(name) = extract_license_from_html(&body) {
                        metrics::counter!("catalog.license.scraped").increment(1);
                        return name;
                    }
                    last_marker = "Unknown".to_string();
                }
                Ok((status @ (404 | 429), _)) => {
                    last_marker = format!("HTTP {status}");
                    continue;
                }
                Ok((status, _)) => return format!("HTTP {status}"),
                Err(detail) => return format!("Error: {detail}"),
            }
        }
        last_marker
    }

    async fn fetch_page(&self, url: &str) -> Result<(u16, String), String> {
        if let Some(cached) = self.cache.lock().await.get(url) {
            return Ok((cached.status, cached.body));
        }

        self.acquire(url).await;
        let response = self
            .fetch
            .get_text_backoff(url)
            .await
            .map_err(|e| e.to_string())?;

        self.cache
            .lock()
            .await
            .insert(url.to_string(), response.clone());
        Ok((response.status, response.body))
    }

    async fn acquire(&self, url: &str) {
        let domain = extract_domain(url);
        if let Err(e) = self.limiter.acquire(&domain, Duration::from_secs(60)).await {
            tracing::warn!(domain = %domain, error = %e, "Rate-limit permit timed out");
        }
    }
}

/// Explicit license spans on HuggingFace repo pages; the first pattern
/// that matches wins.
pub fn extract_license_from_html(content: &str) -> Option<String> {
    let patterns = [
        r#"(?i)<span class="-mr-1 text-gray-400">License:</span>\s*<span>([^<]+)</span>"#,
        r#"(?i)<span[^>]*>License:</span>[^<]*<span[^>]*>([^<]+)</span>"#,
        r#"(?i)"license"\s*:\s*"([^"]+)""#,
        r#"(?i)<dt[^>]*>License</dt>\s*<dd[^>]*>([^<]+)</dd>"#,
        r#"(?i)License:\s*([A-Za-z0-9\-\.\s]+)"#,
    ];

    for pattern in patterns {
        let regex = Regex::new(pattern).expect("license pattern");
        if let Some(captures) = regex.captures(content) {
            let name = captures[1].trim().to_string();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_license_span() {
        let html = r#"<div><span class="-mr-1 text-gray-400">License:</span> <span>llama3.1</span></div>"#;
        assert_eq!(extract_license_from_html(html).as_deref(), Some("llama3.1"));
    }

    #[test]
    fn test_extract_from_json_field() {
        let html = r#"<script>{"license": "apache-2.0", "other": 1}</script>"#;
        assert_eq!(extract_license_from_html(html).as_deref(), Some("apache-2.0"));
    }

    #[test]
    fn test_extract_from_definition_list() {
        let html = "<dl><dt>License</dt>\n<dd>cc-by-nc-4.0</dd></dl>";
        assert_eq!(extract_license_from_html(html).as_deref(), Some("cc-by-nc-4.0"));
    }

    #[test]
    fn test_first_pattern_wins() {
        let html = concat!(
            r#"<span class="-mr-1 text-gray-400">License:</span> <span>gemma</span>"#,
            r#"<script>{"license": "other"}</script>"#,
        );
        assert_eq!(extract_license_from_html(html).as_deref(), Some("gemma"));
    }

    #[test]
    fn test_no_license_span() {
        assert_eq!(extract_license_from_html("<html><body>nothing</body></html>"), None);
    }
}
