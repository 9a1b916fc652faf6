use std::collections::HashMap;
use std::time::Duration;

use catalog_common::config::{GroqSources, ScrapeConfig};
use catalog_common::types::{RawModel, SourceSection};
use catalog_fetch::html;
use catalog_fetch::FetchClient;
use scraper::{ElementRef, Html, Selector};

use super::{ExtractError, ExtractOutcome};

/// Scrape the production-models table, the dynamically populated
/// rate-limits table, and per-model detail pages.
pub async fn extract(
    fetch: &FetchClient,
    sources: &GroqSources,
    scrape: &ScrapeConfig,
) -> Result<ExtractOutcome, ExtractError> {
    let mut outcome = ExtractOutcome::default();

    // Model list is required; everything after degrades to fallbacks.
    let models_page = fetch
        .get_text(&sources.models_page)
        .await
        .map_err(|e| ExtractError::Scrape(e.to_string()))?;
    if !models_page.is_success() {
        return Err(ExtractError::Scrape(format!(
            "models page returned HTTP {}",
            models_page.status
        )));
    }

    let document = Html::parse_document(&models_page.body);
    let (models, mut diagnostics) = parse_production_models(&document);
    if models.is_empty() {
        return Err(ExtractError::Scrape(
            "no rows extracted from the production models table".to_string(),
        ));
    }
    outcome.diagnostics.append(&mut diagnostics);

    // Rate limits populate dynamically; retry until the first data row is
    // non-empty or the attempt budget runs out. The structured table
    // supersedes whatever the models-page cell carried.
    let mut models = models;
    match scrape_rate_limits(fetch, sources, scrape).await {
        Ok(rate_limits) => {
            for model in &mut models {
                if let Some(raw) = rate_limits.get(&model.provider_slug) {
                    if !raw.is_empty() {
                        model.raw_rate_limits = raw.clone();
                    }
                    outcome
                        .rate_limits
                        .insert(model.canonical_slug.clone(), raw.clone());
                }
            }
        }
        Err(e) => outcome
            .diagnostics
            .push(format!("Rate limits unavailable: {e}")),
    }

    // Per-model detail pages for modalities, with the name heuristic as a
    // deterministic fallback.
    for model in &models {
        let (inputs, outputs) = match fetch_model_modalities(fetch, sources, &model.provider_slug)
            .await
        {
            Ok(Some(found)) => found,
            Ok(None) => {
                outcome.diagnostics.push(format!(
                    "{}: no INPUT/OUTPUT labels found, using model-type fallback",
                    model.provider_slug
                ));
                fallback_modalities(&model.provider_slug)
            }
            Err(e) => {
                outcome.diagnostics.push(format!(
                    "{}: detail page failed ({e}), using model-type fallback",
                    model.provider_slug
                ));
                fallback_modalities(&model.provider_slug)
            }
        };
        outcome
            .modalities
            .insert(model.canonical_slug.clone(), (inputs, outputs));

        tokio::time::sleep(Duration::from_millis(scrape.model_page_delay_ms)).await;
    }

    outcome.raw_models = models;
    outcome.sort_models();
    Ok(outcome)
}

/// Parse the production-models table: located by section id or heading,
/// then by its header row, never by table position.
pub fn parse_production_models(document: &Html) -> (Vec<RawModel>, Vec<String>) {
    let mut diagnostics = Vec::new();

    let section = html::find_section(document, "production-models", |text| {
        text.to_lowercase().contains("production models")
    });
    let scope = match section {
        Some(found) => found,
        None => {
            diagnostics
                .push("production-models section not found, scanning all tables".to_string());
            document.root_element()
        }
    };

    let Some(table) = html::find_table_by_headers(scope, |headers| {
        html::column_index(headers, "model id").is_some()
            && html::column_index(headers, "context window").is_some()
    })
    .or_else(|| {
        // The section subtree can miss a table rendered as a sibling.
        html::find_table_by_headers(document.root_element(), |headers| {
            html::column_index(headers, "model id").is_some()
                && html::column_index(headers, "context window").is_some()
        })
    }) else {
        diagnostics.push("production models table not found".to_string());
        return (Vec::new(), diagnostics);
    };

    let headers = html::table_headers(table);
    let limits_column = html::column_index(&headers, "rate limit");

    let row_sel = Selector::parse("tr").expect("tr selector");
    let cell_sel = Selector::parse("td").expect("td selector");

    let mut models = Vec::new();
    for (row_index, row) in table.select(&row_sel).skip(1).enumerate() {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.len() < 2 {
            continue;
        }

        let slug = match model_slug_from_cell(cells[0]) {
            Some(slug) => slug,
            None => {
                diagnostics.push(format!("row {}: could not find model slug", row_index + 1));
                continue;
            }
        };
        if slug.is_empty() || slug.eq_ignore_ascii_case("model") || slug.eq_ignore_ascii_case("model id")
        {
            continue;
        }

        let display_name = display_name_from_cell(cells[0]).unwrap_or_else(|| slug.clone());

        let mut raw = RawModel::new(
            slug.clone(),
            slug.clone(),
            display_name,
            SourceSection::HtmlTable,
        );

        if let Some(column) = limits_column {
            if let Some(cell) = cells.get(column) {
                raw.raw_rate_limits = html::text_lines(*cell).join("\n");
            }
        }
        if let Some(column) = html::column_index(&headers, "context window") {
            raw.context_window = cells
                .get(column)
                .and_then(|cell| parse_token_count(&html::element_text(*cell)));
        }
        if let Some(column) = html::column_index(&headers, "max completion") {
            raw.max_completion_tokens = cells
                .get(column)
                .and_then(|cell| parse_token_count(&html::element_text(*cell)));
        }

        models.push(raw);
    }

    (models, diagnostics)
}

/// Model slug from the first cell: the `span` when present, else the
/// first text line.
fn model_slug_from_cell(cell: ElementRef<'_>) -> Option<String> {
    let span_sel = Selector::parse("span").expect("span selector");
    if let Some(span) = cell.select(&span_sel).next() {
        let text = span.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }
    html::text_lines(cell).into_iter().next()
}

/// Human-readable name from the first cell's anchor, when present.
fn display_name_from_cell(cell: ElementRef<'_>) -> Option<String> {
    let anchor_sel = Selector::parse("a").expect("a selector");
    cell.select(&anchor_sel)
        .next()
        .map(|a| a.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn parse_token_count(text: &str) -> Option<i64> {
    let cleaned = text.trim().to_uppercase().replace(',', "");
    if let Some(thousands) = cleaned.strip_suffix('K') {
        return thousands.trim().parse::<f64>().ok().map(|v| (v * 1000.0) as i64);
    }
    cleaned.parse().ok()
}

/// Retry the rate-limits page until the dynamically populated table has a
/// non-empty first data row.
pub async fn scrape_rate_limits(
    fetch: &FetchClient,
    sources: &GroqSources,
    scrape: &ScrapeConfig,
) -> Result<HashMap<String, String>, ExtractError> {
    for attempt in 1..=scrape.rate_limits_max_attempts {
        tokio::time::sleep(Duration::from_secs(scrape.rate_limits_retry_delay_seconds)).await;

        let page = fetch
            .get_text(&sources.rate_limits_page)
            .await
            .map_err(|e| ExtractError::Scrape(e.to_string()))?;
        if !page.is_success() {
            tracing::warn!(
                status = page.status,
                attempt = attempt,
                "Rate-limits page not available yet"
            );
            continue;
        }

        let document = Html::parse_document(&page.body);
        if let Some(limits) = parse_rate_limits_table(&document) {
            tracing::info!(models = limits.len(), attempt = attempt, "Rate limits loaded");
            return Ok(limits);
        }
        tracing::warn!(attempt = attempt, "Rate-limits table still empty, retrying");
    }

    Err(ExtractError::Scrape(format!(
        "rate-limits table did not populate after {} attempts",
        scrape.rate_limits_max_attempts
    )))
}

/// Parse the populated rate-limits table into per-model raw strings like
/// `30 RPM\n14,400 RPD\n6,000 TPM`. Returns None while the table is empty.
pub fn parse_rate_limits_table(document: &Html) -> Option<HashMap<String, String>> {
    let table = html::find_table_by_headers(document.root_element(), |headers| {
        html::column_index_exact(headers, "model id").is_some()
    })?;

    let data = html::table_data(table);
    let first_row = data.rows.first()?;
    if first_row.iter().all(|cell| cell.is_empty()) {
        return None;
    }

    let model_column = html::column_index(&data.headers, "model")?;
    let unit_columns: Vec<(usize, &str)> = ["RPM", "RPD", "TPM", "TPD", "ASH", "ASD"]
        .iter()
        .filter_map(|unit| html::column_index_exact(&data.headers, unit).map(|i| (i, *unit)))
        .collect();

    let mut limits = HashMap::new();
    for row_index in 0..data.rows.len() {
        let Some(model_id) = data.cell_text(row_index, model_column) else {
            continue;
        };
        if model_id.is_empty()
            || model_id.eq_ignore_ascii_case("model")
            || model_id.eq_ignore_ascii_case("model id")
        {
            continue;
        }

        let mut lines = Vec::new();
        for (column, unit) in &unit_columns {
            if let Some(value) = data.cell_text(row_index, *column) {
                if !value.is_empty() && value != "-" {
                    lines.push(format!("{value} {unit}"));
                }
            }
        }
        limits.insert(model_id, lines.join("\n"));
    }

    Some(limits)
}

/// Modalities from a model's detail page: elements whose text is exactly
/// INPUT/OUTPUT, with the parent's text scanned for modality tokens.
pub async fn fetch_model_modalities(
    fetch: &FetchClient,
    sources: &GroqSources,
    model_id: &str,
) -> Result<Option<(Vec<String>, Vec<String>)>, ExtractError> {
    let url = sources.model_details_template.replace("{model_id}", model_id);
    let page = fetch
        .get_text(&url)
        .await
        .map_err(|e| ExtractError::Scrape(e.to_string()))?;
    if !page.is_success() {
        return Err(ExtractError::Scrape(format!("HTTP {} from {url}", page.status)));
    }

    let document = Html::parse_document(&page.body);
    Ok(detect_modalities(&document))
}

/// Label-based modality detection. Returns None when no labels are found;
/// the caller falls back to the name heuristic.
pub fn detect_modalities(document: &Html) -> Option<(Vec<String>, Vec<String>)> {
    let inputs = tokens_near_label(document, "INPUT");
    let outputs = tokens_near_label(document, "OUTPUT");

    if inputs.is_empty() && outputs.is_empty() {
        return None;
    }
    Some((inputs, outputs))
}

fn tokens_near_label(document: &Html, label: &str) -> Vec<String> {
    let label_sel = Selector::parse("div, span").expect("label selector");
    let mut found = Vec::new();

    for element in document.select(&label_sel) {
        let own_text = element.text().collect::<String>();
        if own_text.trim().to_uppercase() != label {
            continue;
        }

        let Some(parent) = element.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        let parent_text = html::element_text(parent).to_lowercase();
        for token in ["audio", "text", "image", "video"] {
            if parent_text.contains(token) {
                let token = token.to_string();
                if !found.contains(&token) {
                    found.push(token);
                }
            }
        }
    }
    found
}

/// Deterministic modality fallback by model-name heuristic.
pub fn fallback_modalities(model_id: &str) -> (Vec<String>, Vec<String>) {
    let lower = model_id.to_lowercase();
    let to_vec = |tokens: &[&str]| tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>();

    if lower.contains("whisper") {
        (to_vec(&["audio"]), to_vec(&["text"]))
    } else if lower.contains("tts") {
        (to_vec(&["text"]), to_vec(&["audio"]))
    } else if lower.contains("guard") {
        (to_vec(&["image", "text"]), to_vec(&["text"]))
    } else {
        (to_vec(&["text"]), to_vec(&["text"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODELS_PAGE: &str = r#"<html><body>
      <h2 id="production-models">Production Models</h2>
      <div>
        <table>
          <tr><th>Model ID</th><th>Developer</th><th>Context Window</th><th>Rate Limits</th></tr>
          <tr>
            <td><span>llama-3.1-8b-instant</span><a href="/docs/model/llama-3.1-8b-instant">Llama 3.1 8B Instant</a></td>
            <td>Meta</td>
            <td>128K</td>
            <td><span>30 RPM</span><span>14,400 RPD</span></td>
          </tr>
          <tr>
            <td><span>whisper-large-v3</span><a href="/docs/model/whisper-large-v3">Whisper Large V3</a></td>
            <td>OpenAI</td>
            <td>448</td>
            <td><span>20 RPM</span></td>
          </tr>
        </table>
      </div>
    </body></html>"#;

    #[test]
    fn test_parse_production_models() {
        let document = Html::parse_document(MODELS_PAGE);
        let (models, diagnostics) = parse_production_models(&document);
        assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
        assert_eq!(models.len(), 2);

        assert_eq!(models[0].provider_slug, "llama-3.1-8b-instant");
        assert_eq!(models[0].display_name, "Llama 3.1 8B Instant");
        assert_eq!(models[0].raw_rate_limits, "30 RPM\n14,400 RPD");
        assert_eq!(models[0].context_window, Some(128_000));
    }

    #[test]
    fn test_parse_production_models_skips_header_echo() {
        let page = r#"<html><body><h2>Production Models</h2><div><table>
          <tr><th>Model ID</th><th>Context Window</th></tr>
          <tr><td>MODEL ID</td><td></td></tr>
          <tr><td><span>qwen-32b</span></td><td>32K</td></tr>
        </table></div></body></html>"#;
        let document = Html::parse_document(page);
        let (models, _) = parse_production_models(&document);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].provider_slug, "qwen-32b");
    }

    #[test]
    fn test_rate_limits_table_empty_first_row_is_pending() {
        let page = r#"<html><body><table>
          <tr><th>MODEL ID</th><th>RPM</th><th>TPM</th></tr>
          <tr><td></td><td></td><td></td></tr>
        </table></body></html>"#;
        let document = Html::parse_document(page);
        assert!(parse_rate_limits_table(&document).is_none());
    }

    #[test]
    fn test_rate_limits_table_parsed() {
        let page = r#"<html><body><table>
          <tr><th>MODEL ID</th><th>RPM</th><th>RPD</th><th>TPM</th><th>TPD</th></tr>
          <tr><td>llama-3.1-8b-instant</td><td>30</td><td>14,400</td><td>6,000</td><td>-</td></tr>
        </table></body></html>"#;
        let document = Html::parse_document(page);
        let limits = parse_rate_limits_table(&document).expect("populated table");
        assert_eq!(
            limits.get("llama-3.1-8b-instant").map(String::as_str),
            Some("30 RPM\n14,400 RPD\n6,000 TPM")
        );
    }

    #[test]
    fn test_detect_modalities_from_labels() {
        let page = r#"<html><body>
          <div><span>INPUT</span> Audio and text supported</div>
          <div><span>OUTPUT</span> Text</div>
        </body></html>"#;
        let document = Html::parse_document(page);
        let (inputs, outputs) = detect_modalities(&document).expect("labels present");
        assert_eq!(inputs, vec!["audio", "text"]);
        assert_eq!(outputs, vec!["text"]);
    }

    #[test]
    fn test_detect_modalities_absent() {
        let document = Html::parse_document("<html><body><p>No labels here</p></body></html>");
        assert!(detect_modalities(&document).is_none());
    }

    #[test]
    fn test_fallback_modalities_heuristics() {
        assert_eq!(
            fallback_modalities("whisper-large-v3"),
            (vec!["audio".to_string()], vec!["text".to_string()])
        );
        assert_eq!(
            fallback_modalities("playai-tts"),
            (vec!["text".to_string()], vec!["audio".to_string()])
        );
        assert_eq!(
            fallback_modalities("llama-guard-4-12b"),
            (
                vec!["image".to_string(), "text".to_string()],
                vec!["text".to_string()]
            )
        );
        assert_eq!(
            fallback_modalities("qwen-2.5-32b"),
            (vec!["text".to_string()], vec!["text".to_string()])
        );
    }
}
