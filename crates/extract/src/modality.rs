use catalog_common::config::ModalityTables;
use catalog_common::types::ModalityFact;

/// Default priority for tokens absent from the ordering table; ties keep
/// first-seen order because the sort is stable.
const DEFAULT_PRIORITY: i32 = 5;

/// Standardize raw modality tokens: lowercase, map through the config
/// table, dedup preserving first occurrence, then stable-sort by priority.
pub fn standardize_tokens(tokens: &[String], tables: &ModalityTables) -> Vec<String> {
    let mut standardized: Vec<String> = Vec::new();

    for token in tokens {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            continue;
        }

        let canonical = if let Some(mapped) = tables.mappings.get(&token) {
            mapped.clone()
        } else if token.contains("embedding") {
            "Text Embeddings".to_string()
        } else {
            capitalize(&token)
        };

        if !standardized.contains(&canonical) {
            standardized.push(canonical);
        }
    }

    standardized.sort_by_key(|token| {
        tables
            .ordering_priority
            .get(token)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    });

    standardized
}

/// Standardize a comma-separated modality string.
pub fn standardize_string(raw: &str, tables: &ModalityTables) -> Vec<String> {
    let tokens: Vec<String> = raw.split(',').map(|t| t.trim().to_string()).collect();
    standardize_tokens(&tokens, tables)
}

/// Candidate modality lists for one model, in precedence order:
/// per-model override config, then scraper result, then raw API tokens.
#[derive(Clone, Debug, Default)]
pub struct ModalityCandidates {
    pub raw_api: Option<(Vec<String>, Vec<String>)>,
    pub scraped: Option<(Vec<String>, Vec<String>)>,
}

/// Merge candidates by precedence and standardize each direction.
pub fn resolve_modalities(
    canonical_slug: &str,
    candidates: &ModalityCandidates,
    tables: &ModalityTables,
) -> ModalityFact {
    if let Some(override_entry) = tables.overrides.get(canonical_slug) {
        return ModalityFact::new(
            standardize_tokens(&override_entry.input_modalities, tables),
            standardize_tokens(&override_entry.output_modalities, tables),
        );
    }

    let chosen = candidates
        .scraped
        .as_ref()
        .or(candidates.raw_api.as_ref());

    match chosen {
        Some((inputs, outputs)) => ModalityFact::new(
            standardize_tokens(inputs, tables),
            standardize_tokens(outputs, tables),
        ),
        None => ModalityFact::default(),
    }
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_common::config::ModalityOverride;
    use std::collections::HashMap;

    fn tables() -> ModalityTables {
        let mappings: HashMap<String, String> = [
            ("text", "Text"),
            ("image", "Image"),
            ("images", "Image"),
            ("audio", "Audio"),
            ("video", "Video"),
            ("videos", "Video"),
            ("pdf", "PDF"),
            ("file", "PDF"),
            ("text embeddings", "Text Embeddings"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let ordering_priority: HashMap<String, i32> = [
            ("Text", 1),
            ("Image", 2),
            ("Audio", 3),
            ("Video", 4),
            ("PDF", 5),
            ("Text Embeddings", 1),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        ModalityTables {
            mappings,
            ordering_priority,
            overrides: HashMap::new(),
        }
    }

    fn toks(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_priority_ordering() {
        let result = standardize_tokens(&toks(&["Audio", "Text", "Image"]), &tables());
        assert_eq!(result, toks(&["Text", "Image", "Audio"]));
    }

    #[test]
    fn test_dedup_preserves_first() {
        let result = standardize_tokens(&toks(&["text", "Text", "image", "images"]), &tables());
        assert_eq!(result, toks(&["Text", "Image"]));
    }

    #[test]
    fn test_scraped_mixed_case_ordering() {
        // "Audio, video, text" → "Text, Audio, Video" after mapping + ordering.
        let result = standardize_string("Audio, video, text", &tables());
        assert_eq!(result, toks(&["Text", "Audio", "Video"]));
    }

    #[test]
    fn test_embedding_token() {
        let result = standardize_tokens(&toks(&["text embedding"]), &tables());
        assert_eq!(result, toks(&["Text Embeddings"]));
    }

    #[test]
    fn test_unknown_token_capitalized() {
        let result = standardize_tokens(&toks(&["hologram"]), &tables());
        assert_eq!(result, toks(&["Hologram"]));
    }

    #[test]
    fn test_precedence_override_wins() {
        let mut tables = tables();
        tables.overrides.insert(
            "google/special".to_string(),
            ModalityOverride {
                input_modalities: toks(&["text", "pdf"]),
                output_modalities: toks(&["text"]),
            },
        );

        let candidates = ModalityCandidates {
            raw_api: Some((toks(&["text"]), toks(&["text"]))),
            scraped: Some((toks(&["audio"]), toks(&["audio"]))),
        };
        let fact = resolve_modalities("google/special", &candidates, &tables);
        assert_eq!(fact.inputs_string(), "Text, PDF");
        assert_eq!(fact.outputs_string(), "Text");
    }

    #[test]
    fn test_precedence_scraped_over_raw() {
        let candidates = ModalityCandidates {
            raw_api: Some((toks(&["text"]), toks(&["text"]))),
            scraped: Some((toks(&["audio", "video", "text"]), toks(&["audio", "text"]))),
        };
        let fact = resolve_modalities("google/gemini-2.5-flash", &candidates, &tables());
        assert_eq!(fact.inputs_string(), "Text, Audio, Video");
        assert_eq!(fact.outputs_string(), "Text, Audio");
    }
}
