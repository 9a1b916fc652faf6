use std::collections::BTreeMap;

use catalog_common::types::DbRow;

use crate::store::WorkingRow;

/// The fixed field list compared between pipeline output and the working
/// table. Order is the report order.
pub const COMPARE_FIELDS: [&str; 13] = [
    "inference_provider",
    "model_provider",
    "human_readable_name",
    "model_provider_country",
    "official_url",
    "input_modalities",
    "output_modalities",
    "license_info_text",
    "license_info_url",
    "license_name",
    "license_url",
    "rate_limits",
    "provider_api_access",
];

/// Per-field match counters across models present on both sides.
#[derive(Clone, Debug, Default)]
pub struct FieldStat {
    pub exact: usize,
    pub differs: usize,
    pub missing_pipeline: usize,
    pub missing_supabase: usize,
}

/// One differing field on one model.
#[derive(Clone, Debug)]
pub struct FieldDiff {
    pub field: &'static str,
    pub pipeline_value: String,
    pub supabase_value: String,
}

/// The full diff between the pipeline's rows and the current table slice.
/// Purely informational; nothing here mutates state.
#[derive(Clone, Debug, Default)]
pub struct Comparison {
    pub in_both: usize,
    pub pipeline_only: Vec<String>,
    pub supabase_only: Vec<String>,
    pub with_differences: usize,
    pub field_stats: BTreeMap<&'static str, FieldStat>,
    /// name → differing fields, for models in both.
    pub row_diffs: BTreeMap<String, Vec<FieldDiff>>,
    pub pipeline_duplicates: Vec<String>,
    pub supabase_duplicates: Vec<String>,
}

fn field_of_row(row: &DbRow, field: &str) -> String {
    match field {
        "inference_provider" => row.inference_provider.clone(),
        "model_provider" => row.model_provider.clone(),
        "human_readable_name" => row.human_readable_name.clone(),
        "model_provider_country" => row.model_provider_country.clone(),
        "official_url" => row.official_url.clone(),
        "input_modalities" => row.input_modalities.clone(),
        "output_modalities" => row.output_modalities.clone(),
        "license_info_text" => row.license_info_text.clone(),
        "license_info_url" => row.license_info_url.clone(),
        "license_name" => row.license_name.clone(),
        "license_url" => row.license_url.clone(),
        "rate_limits" => row.rate_limits.clone(),
        "provider_api_access" => row.provider_api_access.clone(),
        _ => String::new(),
    }
}

fn field_of_working(row: &WorkingRow, field: &str) -> String {
    let value = match field {
        "inference_provider" => row.inference_provider.clone(),
        "model_provider" => row.model_provider.clone(),
        "human_readable_name" => row.human_readable_name.clone(),
        "model_provider_country" => row.model_provider_country.clone(),
        "official_url" => row.official_url.clone(),
        "input_modalities" => row.input_modalities.clone(),
        "output_modalities" => row.output_modalities.clone(),
        "license_info_text" => row.license_info_text.clone(),
        "license_info_url" => row.license_info_url.clone(),
        "license_name" => row.license_name.clone(),
        "license_url" => row.license_url.clone(),
        "rate_limits" => row.rate_limits.clone(),
        "provider_api_access" => row.provider_api_access.clone(),
        _ => None,
    };
    // SQL NULL and empty string compare equal.
    value.unwrap_or_default()
}

/// Values compare trimmed; empty equals NULL.
fn values_equal(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

/// Diff the pipeline's prepared rows against the current table slice,
/// keyed by human_readable_name.
pub fn compare(pipeline: &[DbRow], supabase: &[WorkingRow]) -> Comparison {
    let mut result = Comparison::default();
    for field in COMPARE_FIELDS {
        result.field_stats.insert(field, FieldStat::default());
    }

    let mut pipeline_index: BTreeMap<String, &DbRow> = BTreeMap::new();
    for row in pipeline {
        let name = row.human_readable_name.trim().to_string();
        if pipeline_index.insert(name.clone(), row).is_some() {
            result.pipeline_duplicates.push(name);
        }
    }

    let mut supabase_index: BTreeMap<String, &WorkingRow> = BTreeMap::new();
    for row in supabase {
        let name = field_of_working(row, "human_readable_name").trim().to_string();
        if supabase_index.insert(name.clone(), row).is_some() {
            result.supabase_duplicates.push(name);
        }
    }

    for (name, pipeline_row) in &pipeline_index {
        let Some(supabase_row) = supabase_index.get(name) else {
            result.pipeline_only.push(name.clone());
            continue;
        };
        result.in_both += 1;

        let mut diffs = Vec::new();
        for field in COMPARE_FIELDS {
            let pipeline_value = field_of_row(pipeline_row, field);
            let supabase_value = field_of_working(supabase_row, field);
            let stat = result.field_stats.get_mut(field).expect("initialized field");

            if values_equal(&pipeline_value, &supabase_value) {
                stat.exact += 1;
            } else if pipeline_value.trim().is_empty() {
                stat.missing_pipeline += 1;
                diffs.push(FieldDiff {
                    field,
                    pipeline_value,
                    supabase_value,
                });
            } else if supabase_value.trim().is_empty() {
                stat.missing_supabase += 1;
                diffs.push(FieldDiff {
                    field,
                    pipeline_value,
                    supabase_value,
                });
            } else {
                stat.differs += 1;
                diffs.push(FieldDiff {
                    field,
                    pipeline_value,
                    supabase_value,
                });
            }
        }

        if !diffs.is_empty() {
            result.with_differences += 1;
            result.row_diffs.insert(name.clone(), diffs);
        }
    }

    for name in supabase_index.keys() {
        if !pipeline_index.contains_key(name) {
            result.supabase_only.push(name.clone());
        }
    }

    result
}

/// Render the comparison into the stage's report body.
pub fn render_report(comparison: &Comparison) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(80));
    out.push_str("\nFIELD COMPARISON REPORT: PIPELINE vs SUPABASE\n");
    out.push_str(&"=".repeat(80));
    out.push_str("\n\n1. OVERALL COUNTS:\n");
    out.push_str(&format!("  Models in both: {}\n", comparison.in_both));
    out.push_str(&format!(
        "  Pipeline only: {}\n",
        comparison.pipeline_only.len()
    ));
    out.push_str(&format!(
        "  Supabase only: {}\n",
        comparison.supabase_only.len()
    ));
    out.push_str(&format!(
        "  Models with differences: {}\n\n",
        comparison.with_differences
    ));

    if !comparison.pipeline_duplicates.is_empty() || !comparison.supabase_duplicates.is_empty() {
        out.push_str("DUPLICATE NAMES DETECTED:\n");
        for name in &comparison.pipeline_duplicates {
            out.push_str(&format!("  pipeline: {name}\n"));
        }
        for name in &comparison.supabase_duplicates {
            out.push_str(&format!("  supabase: {name}\n"));
        }
        out.push('\n');
    }

    out.push_str("2. FIELD-BY-FIELD ANALYSIS (for models in both systems):\n");
    for field in COMPARE_FIELDS {
        let stat = &comparison.field_stats[field];
        out.push_str(&format!(
            "  {field:<24} exact: {:<5} differs: {:<5} missing-pipeline: {:<5} missing-supabase: {}\n",
            stat.exact, stat.differs, stat.missing_pipeline, stat.missing_supabase
        ));
    }
    out.push('\n');

    if !comparison.pipeline_only.is_empty() {
        out.push_str("3. MODELS ONLY IN PIPELINE:\n");
        for name in &comparison.pipeline_only {
            out.push_str(&format!("  {name}\n"));
        }
        out.push('\n');
    }
    if !comparison.supabase_only.is_empty() {
        out.push_str("4. MODELS ONLY IN SUPABASE:\n");
        for name in &comparison.supabase_only {
            out.push_str(&format!("  {name}\n"));
        }
        out.push('\n');
    }

    if !comparison.row_diffs.is_empty() {
        out.push_str("5. ROW-LEVEL DIFFERENCES:\n");
        for (name, diffs) in &comparison.row_diffs {
            out.push_str(&format!("  {name}\n"));
            for diff in diffs {
                out.push_str(&format!(
                    "    {}: pipeline='{}' supabase='{}'\n",
                    diff.field, diff.pipeline_value, diff.supabase_value
                ));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn db_row(name: &str, license_name: &str) -> DbRow {
        DbRow {
            inference_provider: "Groq".into(),
            model_provider: "Meta".into(),
            human_readable_name: name.into(),
            provider_slug: "slug".into(),
            model_provider_country: "United States".into(),
            official_url: "https://ai.meta.com".into(),
            input_modalities: "Text".into(),
            output_modalities: "Text".into(),
            license_info_text: String::new(),
            license_info_url: String::new(),
            license_name: license_name.into(),
            license_url: String::new(),
            rate_limits: String::new(),
            provider_api_access: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn working_row(name: &str, license_name: Option<&str>) -> WorkingRow {
        WorkingRow {
            id: 1,
            inference_provider: Some("Groq".into()),
            model_provider: Some("Meta".into()),
            human_readable_name: Some(name.into()),
            provider_slug: Some("slug".into()),
            model_provider_country: Some("United States".into()),
            official_url: Some("https://ai.meta.com".into()),
            input_modalities: Some("Text".into()),
            output_modalities: Some("Text".into()),
            license_info_text: None,
            license_info_url: None,
            license_name: license_name.map(String::from),
            license_url: None,
            rate_limits: None,
            provider_api_access: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_null_equals_empty() {
        let pipeline = vec![db_row("Model A", "")];
        let supabase = vec![working_row("Model A", None)];
        let comparison = compare(&pipeline, &supabase);

        assert_eq!(comparison.in_both, 1);
        assert_eq!(comparison.with_differences, 0);
        assert_eq!(comparison.field_stats["license_name"].exact, 1);
    }

    #[test]
    fn test_difference_detected() {
        let pipeline = vec![db_row("Model A", "MIT")];
        let supabase = vec![working_row("Model A", Some("Apache 2.0"))];
        let comparison = compare(&pipeline, &supabase);

        assert_eq!(comparison.with_differences, 1);
        assert_eq!(comparison.field_stats["license_name"].differs, 1);
        let diffs = &comparison.row_diffs["Model A"];
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field, "license_name");
    }

    #[test]
    fn test_one_sided_models() {
        let pipeline = vec![db_row("Only Pipeline", "MIT")];
        let supabase = vec![working_row("Only Supabase", Some("MIT"))];
        let comparison = compare(&pipeline, &supabase);

        assert_eq!(comparison.in_both, 0);
        assert_eq!(comparison.pipeline_only, vec!["Only Pipeline".to_string()]);
        assert_eq!(comparison.supabase_only, vec!["Only Supabase".to_string()]);
    }

    #[test]
    fn test_duplicates_detected() {
        let pipeline = vec![db_row("Twin", "MIT"), db_row("Twin", "MIT")];
        let comparison = compare(&pipeline, &[]);
        assert_eq!(comparison.pipeline_duplicates, vec!["Twin".to_string()]);
    }

    #[test]
    fn test_whitespace_trimmed() {
        let pipeline = vec![db_row("Model A", " MIT ")];
        let supabase = vec![working_row("Model A", Some("MIT"))];
        let comparison = compare(&pipeline, &supabase);
        assert_eq!(comparison.with_differences, 0);
    }

    #[test]
    fn test_report_renders() {
        let pipeline = vec![db_row("Model A", "MIT")];
        let supabase = vec![working_row("Model B", Some("MIT"))];
        let report = render_report(&compare(&pipeline, &supabase));
        assert!(report.contains("OVERALL COUNTS"));
        assert!(report.contains("Model A"));
        assert!(report.contains("Model B"));
    }
}
