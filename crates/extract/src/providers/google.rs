use std::collections::HashMap;

use catalog_common::config::GoogleSources;
use catalog_common::types::{RawModel, SourceSection};
use catalog_fetch::html;
use catalog_fetch::FetchClient;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use super::ExtractError;

/// Google models list payload (`GET {base}/v1beta/models?key=…`).
#[derive(Debug, Deserialize)]
pub struct ModelsListResponse {
    #[serde(default)]
    pub models: Vec<ApiModel>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiModel {
    /// Canonical slug, e.g. `models/gemini-2.5-flash`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub input_token_limit: Option<i64>,
    #[serde(default)]
    pub output_token_limit: Option<i64>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

/// Fetch the REST model list. This is the required half of the extractor;
/// documentation scraping degrades independently.
pub async fn fetch_api_models(
    fetch: &FetchClient,
    sources: &GoogleSources,
    api_key: &str,
) -> Result<Vec<RawModel>, ExtractError> {
    let url = format!(
        "{}/v1beta/models?key={}&pageSize=1000",
        sources.api_base.trim_end_matches('/'),
        api_key
    );
    let response: ModelsListResponse = fetch
        .get_json(&url, None)
        .await
        .map_err(|e| ExtractError::Api(e.to_string()))?;

    let models = response
        .models
        .into_iter()
        .map(|api| {
            let display_name = api
                .display_name
                .clone()
                .unwrap_or_else(|| api.name.clone());
            let mut raw = RawModel::new(
                api.name.clone(),
                api.name.clone(),
                display_name,
                SourceSection::Api,
            );
            raw.context_window = api.input_token_limit;
            raw.max_completion_tokens = api.output_token_limit;
            raw
        })
        .collect::<Vec<_>>();

    tracing::info!(models = models.len(), "Google models fetched");
    Ok(models)
}

/// Scrape all configured documentation pages for modalities. Pages fetch
/// concurrently; results merge in sorted page order so the outcome is
/// deterministic regardless of arrival order.
pub async fn scrape_modalities(
    fetch: &FetchClient,
    sources: &GoogleSources,
) -> (HashMap<String, (Vec<String>, Vec<String>)>, Vec<String>) {
    let mut page_names: Vec<&String> = sources.docs_pages.keys().collect();
    page_names.sort();

    let fetches = page_names.iter().map(|name| {
        let url = sources.docs_pages[name.as_str()].clone();
        async move { (name.to_string(), fetch.get_text(&url).await) }
    });
    let pages = futures::future::join_all(fetches).await;

    let mut merged = HashMap::new();
    let mut diagnostics = Vec::new();

    for (name, result) in pages {
        let body = match result {
            Ok(response) if response.is_success() => response.body,
            Ok(response) => {
                diagnostics.push(format!("{name}: HTTP {}", response.status));
                continue;
            }
            Err(e) => {
                diagnostics.push(format!("{name}: {e}"));
                continue;
            }
        };

        let document = Html::parse_document(&body);
        let scraped = match name.as_str() {
            "gemini" => parse_gemini_page(&document),
            "imagen" => parse_heading_sections(&document, "Imagen"),
            "video" => parse_heading_sections(&document, "Veo"),
            key if key.starts_with("gemma") => parse_gemma_page(&document, key),
            other => {
                diagnostics.push(format!("{other}: unknown documentation page kind"));
                continue;
            }
        };

        if scraped.is_empty() {
            diagnostics.push(format!("{name}: no modality panels found"));
        }
        for (key, value) in scraped {
            merged.entry(key).or_insert(value);
        }
    }

    (merged, diagnostics)
}

/// Gemini page: every `devsite-expandable[id^=gemini]` and
/// `devsite-selector[active^=gemini]` panel, with nested selectors
/// emitting one record per distinct active variant.
pub fn parse_gemini_page(document: &Html) -> HashMap<String, (Vec<String>, Vec<String>)> {
    let mut found = HashMap::new();

    for (id, panel) in html::expandable_panels(document, "gemini") {
        let key = html::strip_version_qualifiers(&id);
        if let Some(modalities) = panel_modalities(panel) {
            found.entry(key.clone()).or_insert(modalities);
        }

        for (active, selector) in html::nested_selectors(panel) {
            let variant_key = html::strip_version_qualifiers(&active);
            if variant_key == key {
                continue;
            }
            if let Some(modalities) = panel_modalities(selector) {
                found.entry(variant_key).or_insert(modalities);
            }
        }
    }

    for (active, panel) in html::selector_panels(document, "gemini") {
        let key = html::strip_version_qualifiers(&active);
        if let Some(modalities) = panel_modalities(panel) {
            found.entry(key).or_insert(modalities);
        }
    }

    found
}

/// Supported-data-types content of one panel: a table when present, else
/// the labeled text fallback.
fn panel_modalities(panel: ElementRef<'_>) -> Option<(Vec<String>, Vec<String>)> {
    let table_sel = Selector::parse("table").expect("table selector");
    for table in panel.select(&table_sel) {
        let text = html::element_text(table).to_lowercase();
        if text.contains("supported data types")
            || (text.contains("inputs") && text.contains("output"))
        {
            if let Some(parsed) = html::parse_data_types_table(table) {
                return Some(parsed);
            }
        }
    }

    let text = html::element_text(panel);
    let lowered = text.to_lowercase();
    if lowered.contains("input") && lowered.contains("output") {
        return html::parse_supported_data_types(&text);
    }
    None
}

/// Imagen/Veo pages publish per-model sections anchored by headings. Keys
/// are the heading texts (e.g. "Imagen 3", "Veo 2").
pub fn parse_heading_sections(
    document: &Html,
    heading_prefix: &str,
) -> HashMap<String, (Vec<String>, Vec<String>)> {
    let heading_sel = Selector::parse("h1, h2, h3").expect("heading selector");
    let mut found = HashMap::new();

    for heading in document.select(&heading_sel) {
        let title = heading.text().collect::<String>().trim().to_string();
        if !title.starts_with(heading_prefix) {
            continue;
        }

        let Some(section) = heading.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        if let Some(modalities) = panel_modalities(section) {
            found.entry(title).or_insert(modalities);
        }
    }

    found
}

/// Gemma model cards carry a descriptive paragraph instead of a data-types
/// table: position 6, then 7, then a full scan.
pub fn parse_gemma_page(
    document: &Html,
    page_key: &str,
) -> HashMap<String, (Vec<String>, Vec<String>)> {
    let family = gemma_family_for_page(page_key);
    let paragraph_sel = Selector::parse("p").expect("p selector");
    let paragraphs: Vec<String> = document
        .select(&paragraph_sel)
        .map(|p| html::element_text(p))
        .collect();

    let fixed_positions = [6, 7];
    let candidate = fixed_positions
        .iter()
        .filter_map(|&index| paragraphs.get(index))
        .chain(paragraphs.iter())
        .find(|text| {
            let lowered = text.to_lowercase();
            lowered.contains("input") && lowered.contains("output")
        });

    let mut found = HashMap::new();
    if let Some(text) = candidate {
        let inputs = description_tokens(text, "input");
        let outputs = description_tokens(text, "output");
        if !inputs.is_empty() && !outputs.is_empty() {
            found.insert(family.to_string(), (inputs, outputs));
        }
    }
    found
}

fn gemma_family_for_page(page_key: &str) -> &'static str {
    match page_key {
        "gemma3n" => "Gemma 3n",
        "gemma2" => "Gemma 2",
        _ => "Gemma 3",
    }
}

/// Modality keywords inside a descriptive sentence following a label,
/// e.g. "Input: Text string, such as a question or prompt; images...".
fn description_tokens(text: &str, label: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let Some(label_pos) = lowered.find(label) else {
        return Vec::new();
    };

    // Scope the scan to this label's sentence block: up to the next label
    // or the end of the text.
    let after = &lowered[label_pos + label.len()..];
    let other = if label == "input" { "output" } else { "input" };
    let segment = match after.find(other) {
        Some(end) => &after[..end],
        None => after,
    };

    let mut tokens = Vec::new();
    for token in ["text", "image", "audio", "video"] {
        if segment.contains(token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Known-wrong patterns in a freshly scraped modality set. A non-empty
/// result (or an undersized set) preserves the previous artifact.
pub fn detect_quality_issues(scraped: &HashMap<String, (Vec<String>, Vec<String>)>) -> Vec<String> {
    let mut issues = Vec::new();

    for (key, (inputs, outputs)) in scraped {
        let key_lower = key.to_lowercase();

        let has_pdf = inputs.iter().any(|t| t.eq_ignore_ascii_case("pdf"));
        if has_pdf
            && key_lower.contains("gemini")
            && key_lower.contains("2.0")
            && !key_lower.contains("2.5")
        {
            issues.push(format!("Incorrect PDF modality for {key}"));
        }

        let unknown = |tokens: &[String]| tokens.iter().any(|t| t.eq_ignore_ascii_case("unknown"));
        if unknown(inputs) || unknown(outputs) {
            issues.push(format!("Unknown modalities for {key}"));
        }
    }

    issues
}

/// Look up scraped modalities for an API model slug: direct normalized-id
/// match, Gemma family match, then prefix match for Imagen/Veo headings.
pub fn modality_for_slug(
    provider_slug: &str,
    scraped: &HashMap<String, (Vec<String>, Vec<String>)>,
) -> Option<(Vec<String>, Vec<String>)> {
    let stripped = html::strip_version_qualifiers(provider_slug);
    if let Some(found) = scraped.get(&stripped) {
        return Some(found.clone());
    }

    if stripped.starts_with("gemma") {
        let family = if stripped.starts_with("gemma-3n") {
            "Gemma 3n"
        } else if stripped.starts_with("gemma-2") {
            "Gemma 2"
        } else {
            "Gemma 3"
        };
        return scraped.get(family).cloned();
    }

    // Heading keys like "Imagen 3" / "Veo 2" against slugs like
    // "imagen-3.0-generate-002".
    let slug_normalized = crate::names::normalize_slug(&stripped);
    for (key, value) in scraped {
        let key_normalized = crate::names::normalize_slug(key);
        if !key_normalized.is_empty() && slug_normalized.starts_with(&key_normalized) {
            return Some(value.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEMINI_PAGE: &str = r#"<html><body>
      <devsite-selector scope="auto" active="gemini-2.5-flash-latest-001">
        <table><tr><th>Property</th><th>Description</th></tr>
        <tr><td>Supported data types</td>
        <td>Inputs
Audio, video, and text
Output
Audio and text</td></tr></table>
      </devsite-selector>
      <devsite-expandable id="gemini-2.0-flash">
        <table><tr><td>Supported data types
Inputs
Text and image
Output
Text</td></tr></table>
        <devsite-selector active="gemini-2.0-flash-live-001">
          <table><tr><td>Supported data types
Inputs
Audio and video
Output
Audio
</td></tr></table>
        </devsite-selector>
      </devsite-expandable>
    </body></html>"#;

    #[test]
    fn test_parse_gemini_selector_panel() {
        let document = Html::parse_document(GEMINI_PAGE);
        let scraped = parse_gemini_page(&document);

        let (inputs, outputs) = scraped.get("gemini-2.5-flash").expect("normalized key");
        assert_eq!(inputs, &vec!["Audio", "video", "text"]);
        assert_eq!(outputs, &vec!["Audio", "text"]);
    }

    #[test]
    fn test_parse_gemini_nested_selector_variant() {
        let document = Html::parse_document(GEMINI_PAGE);
        let scraped = parse_gemini_page(&document);

        assert!(scraped.contains_key("gemini-2.0-flash"));
        let (live_inputs, _) = scraped
            .get("gemini-2.0-flash-live")
            .expect("nested variant emitted separately");
        assert_eq!(live_inputs, &vec!["Audio", "video"]);
    }

    #[test]
    fn test_parse_heading_sections() {
        let page = r#"<html><body><div>
          <h3>Imagen 3</h3>
          <p>Inputs: Text</p><p>Output: Images</p>
        </div></body></html>"#;
        let document = Html::parse_document(page);
        let scraped = parse_heading_sections(&document, "Imagen");
        let (inputs, outputs) = scraped.get("Imagen 3").expect("heading section");
        assert_eq!(inputs, &vec!["Text"]);
        assert_eq!(outputs, &vec!["Images"]);
    }

    #[test]
    fn test_parse_gemma_page_scan() {
        let page = r#"<html><body>
          <p>Intro paragraph.</p>
          <p>Input: Text string, such as a question, a prompt, or images to be analyzed.
          Output: Generated text in response, such as an answer.</p>
        </body></html>"#;
        let document = Html::parse_document(page);
        let scraped = parse_gemma_page(&document, "gemma3");
        let (inputs, outputs) = scraped.get("Gemma 3").expect("family entry");
        assert_eq!(inputs, &vec!["text", "image"]);
        assert_eq!(outputs, &vec!["text"]);
    }

    #[test]
    fn test_quality_gate_pdf_on_gemini_20() {
        let mut scraped = HashMap::new();
        scraped.insert(
            "gemini-2.0-flash".to_string(),
            (vec!["Text".to_string(), "PDF".to_string()], vec!["Text".to_string()]),
        );
        let issues = detect_quality_issues(&scraped);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("gemini-2.0-flash"));
    }

    #[test]
    fn test_quality_gate_allows_pdf_on_25() {
        let mut scraped = HashMap::new();
        scraped.insert(
            "gemini-2.5-pro".to_string(),
            (vec!["Text".to_string(), "PDF".to_string()], vec!["Text".to_string()]),
        );
        assert!(detect_quality_issues(&scraped).is_empty());
    }

    #[test]
    fn test_modality_for_slug_direct_and_family() {
        let mut scraped = HashMap::new();
        scraped.insert(
            "gemini-2.5-flash".to_string(),
            (vec!["text".to_string()], vec!["text".to_string()]),
        );
        scraped.insert(
            "Gemma 3".to_string(),
            (vec!["text".to_string(), "image".to_string()], vec!["text".to_string()]),
        );
        scraped.insert(
            "Imagen 3".to_string(),
            (vec!["text".to_string()], vec!["image".to_string()]),
        );

        assert!(modality_for_slug("gemini-2.5-flash-latest-001", &scraped).is_some());
        assert!(modality_for_slug("gemma-3-27b-it", &scraped).is_some());
        assert!(modality_for_slug("imagen-3.0-generate-002", &scraped).is_some());
        assert!(modality_for_slug("unrelated-model", &scraped).is_none());
    }
}
