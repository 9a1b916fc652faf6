use std::collections::HashMap;

/// Standardize a raw license name through the case-insensitive config
/// table. Error-like strings collapse to "Unknown". Idempotent: the
/// mapped values are fixed points of the table.
pub fn standardize_license_name(raw: &str, mappings: &HashMap<String, String>) -> String {
    let cleaned = raw.trim();
    if cleaned.is_empty() || is_error_like(cleaned) {
        return "Unknown".to_string();
    }

    if let Some(mapped) = mappings.get(cleaned) {
        return mapped.clone();
    }

    let lowered = cleaned.to_lowercase();
    for (key, value) in mappings {
        if key.to_lowercase() == lowered {
            return value.clone();
        }
    }

    cleaned.to_string()
}

/// Failure strings that license extraction can surface in place of a name.
fn is_error_like(value: &str) -> bool {
    let lowered = value.to_lowercase();
    lowered.starts_with("http ")
        || lowered.starts_with("error:")
        || lowered.starts_with("parse error:")
        || lowered == "not found"
        || lowered == "no hf id"
        || lowered == "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings() -> HashMap<String, String> {
        [
            ("apache-2.0", "Apache 2.0"),
            ("mit", "MIT"),
            ("llama3.1", "Llama 3.1"),
            ("cc-by-nc-4.0", "CC BY-NC 4.0"),
            ("gemma", "Gemma"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_known_names() {
        let m = mappings();
        assert_eq!(standardize_license_name("apache-2.0", &m), "Apache 2.0");
        assert_eq!(standardize_license_name("MIT", &m), "MIT");
        assert_eq!(standardize_license_name("llama3.1", &m), "Llama 3.1");
    }

    #[test]
    fn test_error_like_to_unknown() {
        let m = mappings();
        assert_eq!(standardize_license_name("HTTP 404", &m), "Unknown");
        assert_eq!(standardize_license_name("HTTP 429 (Rate Limited after 3 attempts)", &m), "Unknown");
        assert_eq!(standardize_license_name("Error: connection reset", &m), "Unknown");
        assert_eq!(standardize_license_name("Parse Error: bad span", &m), "Unknown");
        assert_eq!(standardize_license_name("Not Found", &m), "Unknown");
        assert_eq!(standardize_license_name("No HF ID", &m), "Unknown");
        assert_eq!(standardize_license_name("", &m), "Unknown");
        assert_eq!(standardize_license_name("   ", &m), "Unknown");
    }

    #[test]
    fn test_unmapped_passes_through() {
        let m = mappings();
        assert_eq!(standardize_license_name("BigScience RAIL", &m), "BigScience RAIL");
    }

    #[test]
    fn test_idempotent() {
        let m = mappings();
        for raw in ["apache-2.0", "MIT", "HTTP 404", "BigScience RAIL", "llama3.1", ""] {
            let once = standardize_license_name(raw, &m);
            assert_eq!(standardize_license_name(&once, &m), once);
        }
    }
}
