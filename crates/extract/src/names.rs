use std::collections::HashMap;

use regex::Regex;

/// Suffixes stripped (at most one, longest candidate first) when
/// normalizing a slug for cross-reference matching.
const STRIPPABLE_SUFFIXES: [&str; 6] = [
    "-instruct",
    "-preview",
    "-turbo",
    "-chat",
    "-exp",
    "-it",
];

/// Normalize a provider slug to the performance-metric slug convention:
/// periods, spaces, and underscores become hyphens, runs collapse, the
/// result is lowercased, and one known variant suffix is stripped.
///
/// `gpt-4.0` → `gpt-4-0`; `gemma-3-12b-it` → `gemma-3-12b`.
pub fn normalize_slug(slug: &str) -> String {
    if slug.is_empty() {
        return String::new();
    }

    let separators = Regex::new(r"[.\s_]+").expect("separator pattern");
    let mut normalized = separators.replace_all(slug, "-").to_string();

    let runs = Regex::new(r"-+").expect("hyphen-run pattern");
    normalized = runs.replace_all(&normalized, "-").to_string();

    normalized = normalized.trim_matches('-').to_lowercase();

    for suffix in STRIPPABLE_SUFFIXES {
        if let Some(stripped) = normalized.strip_suffix(suffix) {
            normalized = stripped.to_string();
            break;
        }
    }

    normalized
}

/// Clean a provider display name into the human-readable form stored in
/// the catalog: provider prefix and " (free)" suffix removed, special
/// substitutions applied, Gemma names derived from the slug.
pub fn clean_display_name(
    name: &str,
    canonical_slug: &str,
    substitutions: &HashMap<String, String>,
) -> String {
    if canonical_slug.starts_with("google/gemma") || canonical_slug.starts_with("models/gemma") {
        return gemma_display_name(canonical_slug);
    }

    let mut cleaned = match name.split_once(": ") {
        Some((_, rest)) => rest.trim().to_string(),
        None => name.trim().to_string(),
    };

    if let Some(stripped) = cleaned.strip_suffix(" (free)") {
        cleaned = stripped.trim().to_string();
    }

    if let Some(substituted) = substitutions.get(&cleaned.to_lowercase()) {
        return substituted.clone();
    }

    cleaned
}

/// Derive a Gemma display name from its canonical slug with the
/// documented capitalization: `google/gemma-3n-e2b-it` → `Gemma 3n E2B IT`.
pub fn gemma_display_name(canonical_slug: &str) -> String {
    let model_slug = match canonical_slug.split_once('/') {
        Some((_, rest)) => rest,
        None => canonical_slug,
    };

    let Some(parts) = model_slug.strip_prefix("gemma-") else {
        // Not a gemma-prefixed slug: plain word capitalization.
        return model_slug
            .split('-')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ");
    };

    let mut clean_parts = Vec::new();
    for component in parts.split('-') {
        let part = match component {
            "it" | "e2b" | "e4b" => component.to_uppercase(),
            "3n" => component.to_string(),
            c if c.ends_with('b') && c[..c.len() - 1].chars().all(|ch| ch.is_ascii_digit()) => {
                c.to_uppercase()
            }
            c if c.chars().all(|ch| ch.is_ascii_digit()) => c.to_string(),
            c => capitalize(c),
        };
        clean_parts.push(part);
    }

    format!("Gemma {}", clean_parts.join(" "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_slug_separators() {
        assert_eq!(normalize_slug("gpt-4.0"), "gpt-4-0");
        assert_eq!(normalize_slug("llama 3.1"), "llama-3-1");
        assert_eq!(normalize_slug("model_name_v2"), "model-name-v2");
    }

    #[test]
    fn test_normalize_slug_suffixes() {
        assert_eq!(normalize_slug("gemma-3-12b-it"), "gemma-3-12b");
        assert_eq!(normalize_slug("llama-3.1-8b-instruct"), "llama-3-1-8b");
        // Only one suffix is stripped.
        assert_eq!(normalize_slug("foo-chat-it"), "foo-chat");
    }

    #[test]
    fn test_normalize_slug_edges() {
        assert_eq!(normalize_slug(""), "");
        assert_eq!(normalize_slug("--a--b--"), "a-b");
        assert_eq!(normalize_slug("MiXeD.Case"), "mixed-case");
    }

    #[test]
    fn test_normalize_slug_idempotent() {
        for slug in ["gpt-4.0", "gemma-3-12b-it", "llama 3.1", "plain"] {
            let once = normalize_slug(slug);
            assert_eq!(normalize_slug(&once), once);
        }
    }

    #[test]
    fn test_clean_display_name() {
        let subs = HashMap::new();
        assert_eq!(
            clean_display_name("Meta: Llama 3.1 8B Instruct (free)", "meta-llama/llama-3.1-8b-instruct", &subs),
            "Llama 3.1 8B Instruct"
        );
        assert_eq!(clean_display_name("Plain Model", "x/plain-model", &subs), "Plain Model");
    }

    #[test]
    fn test_clean_display_name_substitution() {
        let mut subs = HashMap::new();
        subs.insert("gpt-oss-120b".to_string(), "OpenAI: gpt-oss-120b".to_string());
        assert_eq!(
            clean_display_name("gpt-oss-120b (free)", "openai/gpt-oss-120b", &subs),
            "OpenAI: gpt-oss-120b"
        );
    }

    #[test]
    fn test_gemma_display_name() {
        assert_eq!(gemma_display_name("google/gemma-3n-e2b-it"), "Gemma 3n E2B IT");
        assert_eq!(gemma_display_name("google/gemma-3-27b-it"), "Gemma 3 27B IT");
        assert_eq!(gemma_display_name("google/gemma-2-9b-it"), "Gemma 2 9B IT");
    }

    #[test]
    fn test_gemma_name_routed_by_slug() {
        let subs = HashMap::new();
        assert_eq!(
            clean_display_name("Google: Gemma 3 4B (free)", "google/gemma-3-4b-it", &subs),
            "Gemma 3 4B IT"
        );
    }
}
