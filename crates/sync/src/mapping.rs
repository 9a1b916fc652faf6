use std::collections::BTreeMap;
use std::path::Path;

use catalog_common::types::MappingRow;
use catalog_extract::artifacts;
use catalog_extract::names::normalize_slug;
use chrono::Utc;

use crate::store::{StoreClient, StoreError};

/// Candidates reported for a model that matched nothing.
pub type NearestCandidates = Vec<(String, f64)>;

/// Result of one mapping refresh, for the stage report.
#[derive(Clone, Debug, Default)]
pub struct MappingSummary {
    pub total_models: usize,
    pub matched: usize,
    /// provider → [(provider_slug, top candidates)]
    pub unmatched: BTreeMap<String, Vec<(String, NearestCandidates)>>,
}

/// Match one normalized provider slug against the performance-metric
/// slugs: exact, then suffix, then contains. First hit wins.
pub fn match_aa_slug(normalized_slug: &str, aa_slugs: &[String]) -> Option<String> {
    if normalized_slug.is_empty() {
        return None;
    }

    for aa_slug in aa_slugs {
        if aa_slug.to_lowercase() == normalized_slug {
            return Some(aa_slug.clone());
        }
    }
    for aa_slug in aa_slugs {
        if aa_slug.to_lowercase().ends_with(normalized_slug) {
            return Some(aa_slug.clone());
        }
    }
    for aa_slug in aa_slugs {
        if aa_slug.to_lowercase().contains(normalized_slug) {
            return Some(aa_slug.clone());
        }
    }
    None
}

/// Top-N most similar aa_slugs for an unmatched model, ratio in [0, 1].
pub fn nearest_aa_slugs(provider_slug: &str, aa_slugs: &[String], top_n: usize) -> NearestCandidates {
    let normalized = normalize_slug(provider_slug);
    let mut scored: Vec<(String, f64)> = aa_slugs
        .iter()
        .map(|aa_slug| {
            let score = sequence_ratio(&normalized, &aa_slug.to_lowercase());
            (aa_slug.clone(), score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_n);
    scored
}

/// Longest-common-subsequence-based similarity ratio in [0, 1]
/// (Ratcliff-Obershelp): twice the characters covered by recursively
/// matched blocks over the combined length.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Characters covered by the longest matching block plus, recursively,
/// the blocks to its left and right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (block_a, block_b, block_len) = longest_matching_block(a, b);
    if block_len == 0 {
        return 0;
    }
    block_len
        + matching_chars(&a[..block_a], &b[..block_b])
        + matching_chars(&a[block_a + block_len..], &b[block_b + block_len..])
}

/// Longest common contiguous block, earliest-in-`a` (then `b`) on ties.
fn longest_matching_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    if a.is_empty() || b.is_empty() {
        return (0, 0, 0);
    }

    let (mut best_a, mut best_b, mut best_len) = (0, 0, 0);
    // lengths[j + 1] holds the run length ending at a[i - 1], b[j].
    let mut lengths = vec![0usize; b.len() + 1];

    for (i, &char_a) in a.iter().enumerate() {
        let mut diagonal = 0;
        for (j, &char_b) in b.iter().enumerate() {
            let above = lengths[j + 1];
            lengths[j + 1] = if char_a == char_b { diagonal + 1 } else { 0 };
            if lengths[j + 1] > best_len {
                best_len = lengths[j + 1];
                best_a = i + 1 - best_len;
                best_b = j + 1 - best_len;
            }
            diagonal = above;
        }
    }

    (best_a, best_b, best_len)
}

/// Build mapping rows for every working-table model that matches, and
/// nearest-candidate reports for the rest.
pub fn build_mappings(
    models: &[(String, String)],
    aa_slugs: &[String],
) -> (Vec<MappingRow>, MappingSummary) {
    let now = Utc::now();
    let mut mappings = Vec::new();
    let mut summary = MappingSummary {
        total_models: models.len(),
        ..MappingSummary::default()
    };

    for (provider, provider_slug) in models {
        let normalized = normalize_slug(provider_slug);
        match match_aa_slug(&normalized, aa_slugs) {
            Some(aa_slug) => {
                mappings.push(MappingRow {
                    inference_provider: provider.clone(),
                    provider_slug: normalized,
                    aa_slug,
                    created_at: now,
                    updated_at: now,
                });
                summary.matched += 1;
            }
            None => {
                let candidates = nearest_aa_slugs(provider_slug, aa_slugs, 5);
                summary
                    .unmatched
                    .entry(provider.clone())
                    .or_default()
                    .push((provider_slug.clone(), candidates));
            }
        }
    }

    (mappings, summary)
}

/// Refresh the mapping table from the working table. The comparison
/// report is always written, matched or not.
pub async fn refresh_model_aa_mapping(
    store: &StoreClient,
    working_table: &str,
    metrics_table: &str,
    mapping_table: &str,
    provider: Option<&str>,
    output_dir: &Path,
) -> Result<MappingSummary, StoreError> {
    tracing::info!(
        provider = provider.unwrap_or("all"),
        "Refreshing model-to-performance-metric mappings"
    );

    let models = store.fetch_working_slugs(working_table, provider).await?;
    if models.is_empty() {
        tracing::warn!("No models found in the working table");
    }

    let aa_slugs = store.fetch_aa_slugs(metrics_table).await?;
    tracing::info!(models = models.len(), aa_slugs = aa_slugs.len(), "Mapping inputs loaded");

    let (mappings, summary) = build_mappings(&models, &aa_slugs);
    store.upsert_mappings(mapping_table, &mappings).await?;

    let report_path = output_dir.join("slugs_comparison.txt");
    if let Err(e) = artifacts::write_report(&report_path, &comparison_report(&summary)) {
        tracing::warn!(error = %e, "Failed to write slug comparison report (non-critical)");
    }

    metrics::counter!("catalog.mapping.matched").increment(summary.matched as u64);
    tracing::info!(
        matched = summary.matched,
        unmatched = summary.total_models - summary.matched,
        "Mapping refresh complete"
    );
    Ok(summary)
}

/// Render the slugs_comparison.txt report.
pub fn comparison_report(summary: &MappingSummary) -> String {
    let mut out = String::new();
    out.push_str("Slug Comparison Report\n");
    out.push_str(&format!("Generated: {}\n", artifacts::ist_timestamp()));
    out.push_str(&"=".repeat(120));
    out.push_str("\n\n");
    out.push_str(&format!(
        "Total models processed: {}\nSuccessfully matched: {}\nUnmatched models: {}\n\n",
        summary.total_models,
        summary.matched,
        summary.total_models - summary.matched
    ));

    if summary.unmatched.is_empty() {
        out.push_str("All models successfully matched to performance metrics.\n");
        out.push_str("No unmatched models to report.\n");
        return out;
    }

    out.push_str("UNMATCHED MODELS WITH NEAREST AA_SLUG CANDIDATES\n");
    out.push_str(&"=".repeat(120));
    out.push('\n');
    out.push_str(&format!(
        "{:<20} | {:<35} | NEAREST AA_SLUG CANDIDATES (Top 5)\n",
        "PROVIDER", "PROVIDER_SLUG"
    ));
    out.push_str(&"=".repeat(120));
    out.push('\n');

    for (provider, models) in &summary.unmatched {
        let mut models = models.clone();
        models.sort_by(|a, b| a.0.cmp(&b.0));

        for (provider_slug, candidates) in models {
            if candidates.is_empty() {
                out.push_str(&format!(
                    "{provider:<20} | {provider_slug:<35} | (no similar candidates found)\n"
                ));
            } else {
                for (index, (aa_slug, score)) in candidates.iter().enumerate() {
                    let (provider_cell, slug_cell) = if index == 0 {
                        (provider.as_str(), provider_slug.as_str())
                    } else {
                        ("", "")
                    };
                    out.push_str(&format!(
                        "{provider_cell:<20} | {slug_cell:<35} | {aa_slug:<40} (similarity: {:.1}%)\n",
                        score * 100.0
                    ));
                }
            }
            out.push_str(&format!("{}-|-{}-|-{}\n", "-".repeat(20), "-".repeat(35), "-".repeat(60)));
        }
        out.push('\n');
    }

    out.push_str(&"=".repeat(120));
    out.push_str("\nEND OF COMPARISON REPORT\n");
    out.push_str(&"=".repeat(120));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aa() -> Vec<String> {
        vec![
            "gpt-4o-2024-05-13".to_string(),
            "meta-llama-3-1-8b-instant".to_string(),
            "gemma-3-12b".to_string(),
            "gemini-2-5-flash".to_string(),
        ]
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(
            match_aa_slug("gemma-3-12b", &aa()).as_deref(),
            Some("gemma-3-12b")
        );
    }

    #[test]
    fn test_suffix_match() {
        // "llama-3-1-8b-instant" matches the aa slug that ends with it.
        assert_eq!(
            match_aa_slug("llama-3-1-8b-instant", &aa()).as_deref(),
            Some("meta-llama-3-1-8b-instant")
        );
    }

    #[test]
    fn test_contains_match() {
        assert_eq!(
            match_aa_slug("gpt-4o", &aa()).as_deref(),
            Some("gpt-4o-2024-05-13")
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(match_aa_slug("whisper-large-v3", &aa()), None);
        assert_eq!(match_aa_slug("", &aa()), None);
    }

    #[test]
    fn test_build_mappings_normalizes_slug() {
        let models = vec![("Google".to_string(), "gemma-3-12b-it".to_string())];
        let (mappings, summary) = build_mappings(&models, &aa());
        assert_eq!(summary.matched, 1);
        // The stored key is the normalized slug, suffix stripped.
        assert_eq!(mappings[0].provider_slug, "gemma-3-12b");
        assert_eq!(mappings[0].aa_slug, "gemma-3-12b");
    }

    #[test]
    fn test_sequence_ratio_bounds() {
        assert_eq!(sequence_ratio("abcd", "abcd"), 1.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abcd", ""), 0.0);
        assert_eq!(sequence_ratio("abcd", "wxyz"), 0.0);
    }

    #[test]
    fn test_sequence_ratio_matching_blocks() {
        // Matched block "bcd": 2*3 / (4+4).
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
        // Reordered segments only credit the longest block and its
        // recursive remainders: "gpt" matches, "-4o" vs "4o-" does not.
        assert!((sequence_ratio("gpt-4o", "4o-gpt") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_ratio_prefers_shared_suffix() {
        // The block-based ratio ranks the slug sharing a long contiguous
        // run above one that merely shares scattered characters.
        let close = sequence_ratio("llama-3-1-8b", "meta-llama-3-1-8b-instant");
        let far = sequence_ratio("llama-3-1-8b", "gemini-2-5-flash");
        assert!(close > far);
    }

    #[test]
    fn test_unmatched_gets_candidates() {
        let models = vec![("Groq".to_string(), "whisper-large-v3".to_string())];
        let (mappings, summary) = build_mappings(&models, &aa());
        assert!(mappings.is_empty());
        let unmatched = summary.unmatched.get("Groq").expect("provider bucket");
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].1.len(), 4); // capped at 5, only 4 available
        // Scores are sorted descending.
        let scores: Vec<f64> = unmatched[0].1.iter().map(|(_, s)| *s).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_comparison_report_renders() {
        let models = vec![
            ("Groq".to_string(), "whisper-large-v3".to_string()),
            ("Google".to_string(), "gemma-3-12b-it".to_string()),
        ];
        let (_, summary) = build_mappings(&models, &aa());
        let report = comparison_report(&summary);
        assert!(report.contains("whisper-large-v3"));
        assert!(report.contains("UNMATCHED MODELS"));
    }
}
