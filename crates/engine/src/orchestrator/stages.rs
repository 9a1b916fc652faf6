use std::collections::HashMap;
use std::path::PathBuf;

use catalog_common::config::{StageConfig, StageKind};
use catalog_common::types::{DbRow, InferenceProvider, LicenseFact, ModalityFact, RawModel};
use catalog_extract::artifacts;
use catalog_extract::license::LicenseResolver;
use catalog_extract::modality::{resolve_modalities, ModalityCandidates};
use catalog_extract::providers::google;
use catalog_extract::providers::{groq, openrouter, ScrapedModality};
use catalog_extract::rate_limits::parse_rate_limits;
use catalog_sync::{promote, refresh, StoreClient};
use serde::{Deserialize, Serialize};

use super::PipelineContext;

/// A completed stage: its rendered report body plus anything the run
/// report should surface.
pub struct StageSuccess {
    pub warning: bool,
    pub diagnostics: Vec<String>,
    report: String,
}

impl StageSuccess {
    fn clean(report: String) -> Self {
        Self {
            warning: false,
            diagnostics: Vec::new(),
            report,
        }
    }

    fn with_diagnostics(report: String, diagnostics: Vec<String>) -> Self {
        Self {
            warning: !diagnostics.is_empty(),
            diagnostics,
            report,
        }
    }
}

/// Run one stage and write its report. The report file exists for every
/// stage that ran, failed ones included.
pub async fn run_stage(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let result = dispatch(ctx, provider, stage).await;
    let report_path = report_path(ctx, provider, stage);

    match result {
        Ok(success) => {
            if let Err(e) = artifacts::write_report(&report_path, &success.report) {
                tracing::warn!(error = %e, "Could not write stage report");
            }
            Ok(success)
        }
        Err(message) => {
            let body = format!(
                "STAGE FAILED: {} ({})\n\n{message}\n",
                stage.kind.as_str(),
                stage.letter
            );
            if let Err(e) = artifacts::write_report(&report_path, &body) {
                tracing::warn!(error = %e, "Could not write failure report");
            }
            Err(message)
        }
    }
}

async fn dispatch(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    match stage.kind {
        StageKind::FetchApiModels => fetch_api_models(ctx, provider, stage).await,
        StageKind::FilterModels => filter_models(ctx, provider, stage).await,
        StageKind::ScrapeModels => scrape_models(ctx, provider, stage).await,
        StageKind::ScrapeRateLimits => Err(format!(
            "scrape-rate-limits is folded into scrape-models for {provider}"
        )),
        StageKind::ScrapeModalities => scrape_modalities(ctx, provider, stage).await,
        StageKind::ResolveLicenses => resolve_licenses(ctx, provider, stage).await,
        StageKind::NormalizeModalities => normalize_modalities(ctx, provider, stage).await,
        StageKind::FuseRecords => fuse_records(ctx, provider, stage).await,
        StageKind::CompareWorking => compare_working(ctx, provider, stage).await,
        StageKind::RefreshWorking => refresh_working(ctx, provider, stage).await,
        StageKind::RefreshMapping => refresh_mapping(ctx, provider, stage).await,
        StageKind::PromoteProduction => promote_production(ctx, provider, stage).await,
    }
}

// --- Artifact plumbing -------------------------------------------------

fn purpose(kind: StageKind) -> &'static str {
    match kind {
        StageKind::FetchApiModels => "fetched-api-models",
        StageKind::FilterModels => "filtered-models",
        StageKind::ScrapeModels => "scraped-models",
        StageKind::ScrapeRateLimits => "scraped-rate-limits",
        StageKind::ScrapeModalities => "scraped-modalities",
        StageKind::ResolveLicenses => "license-facts",
        StageKind::NormalizeModalities => "standardized-modalities",
        StageKind::FuseRecords => "db-data",
        StageKind::CompareWorking => "supabase-comparison",
        StageKind::RefreshWorking => "working-refresh",
        StageKind::RefreshMapping => "aa-mapping",
        StageKind::PromoteProduction => "production-promote",
    }
}

fn stage_letter(ctx: &PipelineContext, provider: InferenceProvider, kind: StageKind) -> Option<String> {
    ctx.config
        .pipeline
        .providers
        .get(provider.as_key())?
        .stages
        .iter()
        .find(|s| s.kind == kind)
        .map(|s| s.letter.clone())
}

/// Artifact path of the stage with the given kind in this provider's plan.
fn artifact_path(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    kind: StageKind,
) -> Result<PathBuf, String> {
    let letter = stage_letter(ctx, provider, kind)
        .ok_or_else(|| format!("No {} stage in the {provider} plan", kind.as_str()))?;
    Ok(ctx
        .provider_dir(provider)
        .join(format!("{letter}-{}.json", purpose(kind))))
}

fn own_artifact_path(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> PathBuf {
    ctx.provider_dir(provider)
        .join(format!("{}-{}.json", stage.letter, purpose(stage.kind)))
}

fn report_path(ctx: &PipelineContext, provider: InferenceProvider, stage: &StageConfig) -> PathBuf {
    ctx.provider_dir(provider)
        .join(format!("{}-{}-report.txt", stage.letter, purpose(stage.kind)))
}

/// The Groq scrape stage writes its per-model modalities next to the
/// models artifact, under the same letter.
fn groq_modalities_path(ctx: &PipelineContext, provider: InferenceProvider) -> Result<PathBuf, String> {
    let letter = stage_letter(ctx, provider, StageKind::ScrapeModels)
        .ok_or_else(|| format!("No scrape-models stage in the {provider} plan"))?;
    Ok(ctx
        .provider_dir(provider)
        .join(format!("{letter}-scraped-modalities.json")))
}

// --- Cross-stage record shapes ----------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct LicenseRecord {
    canonical_slug: String,
    #[serde(flatten)]
    fact: LicenseFact,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModalityRecord {
    canonical_slug: String,
    input_modalities: Vec<String>,
    output_modalities: Vec<String>,
}

/// Raw models for the normalization/fusion stages, rebuilt from the
/// provider's upstream artifact.
fn load_raw_models(
    ctx: &PipelineContext,
    provider: InferenceProvider,
) -> Result<Vec<RawModel>, String> {
    match provider {
        InferenceProvider::OpenRouter => {
            let path = artifact_path(ctx, provider, StageKind::FilterModels)?;
            let models: Vec<openrouter::ApiModel> =
                artifacts::read_models(&path).map_err(|e| e.to_string())?;
            Ok(openrouter::to_outcome(&models).raw_models)
        }
        InferenceProvider::Google => {
            let path = artifact_path(ctx, provider, StageKind::FetchApiModels)?;
            artifacts::read_models(&path).map_err(|e| e.to_string())
        }
        InferenceProvider::Groq => {
            let path = artifact_path(ctx, provider, StageKind::ScrapeModels)?;
            artifacts::read_models(&path).map_err(|e| e.to_string())
        }
    }
}

/// Scraped modality map for the normalization stage, when this provider
/// has one.
fn load_scraped_modalities(
    ctx: &PipelineContext,
    provider: InferenceProvider,
) -> Result<Option<HashMap<String, (Vec<String>, Vec<String>)>>, String> {
    let path = match provider {
        InferenceProvider::Google => artifact_path(ctx, provider, StageKind::ScrapeModalities)?,
        InferenceProvider::Groq => groq_modalities_path(ctx, provider)?,
        InferenceProvider::OpenRouter => return Ok(None),
    };
    if !path.exists() {
        return Ok(None);
    }

    let entries: Vec<ScrapedModality> = artifacts::read_models(&path).map_err(|e| e.to_string())?;
    Ok(Some(
        entries
            .into_iter()
            .map(|entry| (entry.key, (entry.input_modalities, entry.output_modalities)))
            .collect(),
    ))
}

async fn connect_store(ctx: &PipelineContext) -> Result<StoreClient, String> {
    let dsn = ctx
        .credentials
        .require_database_url()
        .map_err(|e| e.to_string())?;
    StoreClient::connect(dsn, ctx.config.pipeline.db.max_connections)
        .await
        .map_err(|e| e.to_string())
}

// --- Stage implementations --------------------------------------------

async fn fetch_api_models(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let path = own_artifact_path(ctx, provider, stage);

    match provider {
        InferenceProvider::OpenRouter => {
            let key = ctx
                .credentials
                .api_key_for("openrouter")
                .ok_or("OPENROUTER_API_KEY is not available")?;
            let models = openrouter::fetch_models(&ctx.fetch, &ctx.config.sources.openrouter, key)
                .await
                .map_err(|e| e.to_string())?;
            artifacts::write_artifact(&path, stage.kind.as_str(), &models)
                .map_err(|e| e.to_string())?;
            Ok(StageSuccess::clean(format!(
                "Fetched {} models from the OpenRouter API\n",
                models.len()
            )))
        }
        InferenceProvider::Google => {
            let key = ctx
                .credentials
                .api_key_for("google")
                .ok_or("GOOGLE_API_KEY is not available")?;
            let models = google::fetch_api_models(&ctx.fetch, &ctx.config.sources.google, key)
                .await
                .map_err(|e| e.to_string())?;
            artifacts::write_artifact(&path, stage.kind.as_str(), &models)
                .map_err(|e| e.to_string())?;
            Ok(StageSuccess::clean(format!(
                "Fetched {} models from the Google API\n",
                models.len()
            )))
        }
        InferenceProvider::Groq => Err("Groq models come from scrape-models, not an API".into()),
    }
}

async fn filter_models(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    if provider != InferenceProvider::OpenRouter {
        return Err(format!("filter-models is not defined for {provider}"));
    }

    let input = artifact_path(ctx, provider, StageKind::FetchApiModels)?;
    let all: Vec<openrouter::ApiModel> =
        artifacts::read_models(&input).map_err(|e| e.to_string())?;
    let total = all.len();

    let (filtered, breakdown) = openrouter::filter_models(all, &ctx.config.filters);
    if filtered.is_empty() {
        return Err("No models passed the filters".to_string());
    }

    let path = own_artifact_path(ctx, provider, stage);
    artifacts::write_artifact(&path, stage.kind.as_str(), &filtered)
        .map_err(|e| e.to_string())?;

    Ok(StageSuccess::clean(openrouter::filter_report(
        total,
        filtered.len(),
        &breakdown,
    )))
}

async fn scrape_models(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    if provider != InferenceProvider::Groq {
        return Err(format!("scrape-models is not defined for {provider}"));
    }

    let outcome = groq::extract(&ctx.fetch, &ctx.config.sources.groq, &ctx.config.pipeline.scrape)
        .await
        .map_err(|e| e.to_string())?;

    let models_path = own_artifact_path(ctx, provider, stage);
    artifacts::write_artifact(&models_path, stage.kind.as_str(), &outcome.raw_models)
        .map_err(|e| e.to_string())?;

    let mut scraped: Vec<ScrapedModality> = outcome
        .modalities
        .iter()
        .map(|(key, (inputs, outputs))| ScrapedModality {
            key: key.clone(),
            input_modalities: inputs.clone(),
            output_modalities: outputs.clone(),
        })
        .collect();
    scraped.sort_by(|a, b| a.key.cmp(&b.key));
    let modalities_path = groq_modalities_path(ctx, provider)?;
    artifacts::write_artifact(&modalities_path, stage.kind.as_str(), &scraped)
        .map_err(|e| e.to_string())?;

    let mut report = format!(
        "Scraped {} production models; modalities for {}; rate limits for {}\n",
        outcome.raw_models.len(),
        outcome.modalities.len(),
        outcome.rate_limits.len()
    );
    if !outcome.diagnostics.is_empty() {
        report.push_str("\nDiagnostics:\n");
        for line in &outcome.diagnostics {
            report.push_str(&format!("  {line}\n"));
        }
    }
    Ok(StageSuccess::with_diagnostics(report, outcome.diagnostics))
}

async fn scrape_modalities(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    if provider != InferenceProvider::Google {
        return Err(format!("scrape-modalities is not defined for {provider}"));
    }

    let (scraped, mut diagnostics) =
        google::scrape_modalities(&ctx.fetch, &ctx.config.sources.google).await;

    // Quality gate: a suspiciously small or known-wrong scrape must not
    // clobber the previous artifact.
    let path = own_artifact_path(ctx, provider, stage);
    let issues = google::detect_quality_issues(&scraped);
    let min_expected = ctx.config.pipeline.scrape.min_expected_models;
    let suspicious = scraped.len() < min_expected || !issues.is_empty();

    if suspicious {
        let existing = artifacts::existing_model_count(&path);
        diagnostics.extend(issues.iter().cloned());

        if let Some(existing_count) = existing {
            if existing_count > scraped.len() || !issues.is_empty() {
                diagnostics.push(format!(
                    "Preserving previous artifact ({existing_count} models) over suspicious scrape ({} models)",
                    scraped.len()
                ));
                let report = format!(
                    "QUALITY GATE: previous artifact preserved\n\nScraped {} models (minimum {min_expected}).\nIssues:\n{}\n",
                    scraped.len(),
                    issues.join("\n")
                );
                return Ok(StageSuccess::with_diagnostics(report, diagnostics));
            }
        }
    }

    let mut entries: Vec<ScrapedModality> = scraped
        .iter()
        .map(|(key, (inputs, outputs))| ScrapedModality {
            key: key.clone(),
            input_modalities: inputs.clone(),
            output_modalities: outputs.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    artifacts::write_artifact(&path, stage.kind.as_str(), &entries).map_err(|e| e.to_string())?;

    let mut report = format!("Scraped modalities for {} models\n", entries.len());
    for entry in &entries {
        report.push_str(&format!(
            "  {}: {} -> {}\n",
            entry.key,
            entry.input_modalities.join(", "),
            entry.output_modalities.join(", ")
        ));
    }
    if !diagnostics.is_empty() {
        report.push_str("\nDiagnostics:\n");
        for line in &diagnostics {
            report.push_str(&format!("  {line}\n"));
        }
    }
    Ok(StageSuccess::with_diagnostics(report, diagnostics))
}

async fn resolve_licenses(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let models = load_raw_models(ctx, provider)?;
    let resolver = LicenseResolver::new(
        &ctx.fetch,
        &ctx.limiter,
        &ctx.cache,
        &ctx.config.licenses,
        &ctx.config.sources.huggingface,
        ctx.credentials.huggingface_api_key.clone(),
    );

    let mut records = Vec::new();
    let mut category_counts: HashMap<&'static str, usize> = HashMap::new();
    for model in &models {
        let fact = resolver
            .resolve(
                &model.canonical_slug,
                &model.display_name,
                model.hugging_face_id.as_deref(),
            )
            .await;
        *category_counts.entry(fact.category.as_str()).or_default() += 1;
        records.push(LicenseRecord {
            canonical_slug: model.canonical_slug.clone(),
            fact,
        });
    }

    let path = own_artifact_path(ctx, provider, stage);
    artifacts::write_artifact(&path, stage.kind.as_str(), &records).map_err(|e| e.to_string())?;

    let mut report = format!("Resolved licenses for {} models\n\nBy category:\n", records.len());
    let mut counts: Vec<_> = category_counts.into_iter().collect();
    counts.sort();
    for (category, count) in counts {
        report.push_str(&format!("  {category}: {count}\n"));
    }
    Ok(StageSuccess::clean(report))
}

async fn normalize_modalities(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let models = load_raw_models(ctx, provider)?;
    let scraped = load_scraped_modalities(ctx, provider)?;
    let mut diagnostics = Vec::new();

    let mut records = Vec::new();
    for model in &models {
        let scraped_entry = match (&scraped, provider) {
            (Some(map), InferenceProvider::Google) => {
                google::modality_for_slug(&model.provider_slug, map)
            }
            (Some(map), _) => map.get(&model.canonical_slug).cloned(),
            (None, _) => None,
        };
        if scraped.is_some() && scraped_entry.is_none() {
            diagnostics.push(format!(
                "{}: no scraped modalities, falling back to API tokens",
                model.canonical_slug
            ));
        }

        let raw_api = (!model.raw_modalities_in.is_empty() || !model.raw_modalities_out.is_empty())
            .then(|| (model.raw_modalities_in.clone(), model.raw_modalities_out.clone()));
        let candidates = ModalityCandidates {
            raw_api,
            scraped: scraped_entry,
        };
        let fact = resolve_modalities(&model.canonical_slug, &candidates, &ctx.config.modalities);
        records.push(ModalityRecord {
            canonical_slug: model.canonical_slug.clone(),
            input_modalities: fact.inputs,
            output_modalities: fact.outputs,
        });
    }

    let path = own_artifact_path(ctx, provider, stage);
    artifacts::write_artifact(&path, stage.kind.as_str(), &records).map_err(|e| e.to_string())?;

    let report = format!(
        "Standardized modalities for {} models ({} without scraped data)\n",
        records.len(),
        diagnostics.len()
    );
    Ok(StageSuccess::with_diagnostics(report, diagnostics))
}

async fn fuse_records(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let models = load_raw_models(ctx, provider)?;

    let license_path = artifact_path(ctx, provider, StageKind::ResolveLicenses)?;
    let licenses: HashMap<String, LicenseFact> = artifacts::read_models::<LicenseRecord>(&license_path)
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|record| (record.canonical_slug, record.fact))
        .collect();

    let modality_path = artifact_path(ctx, provider, StageKind::NormalizeModalities)?;
    let modalities: HashMap<String, ModalityFact> =
        artifacts::read_models::<ModalityRecord>(&modality_path)
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|record| {
                (
                    record.canonical_slug,
                    ModalityFact::new(record.input_modalities, record.output_modalities),
                )
            })
            .collect();

    let inputs = catalog_extract::fuse::FuseInputs {
        provider,
        raw_models: &models,
        licenses: &licenses,
        modalities: &modalities,
        tables: &ctx.config.providers,
    };
    let (rows, removed) = catalog_extract::fuse::fuse(&inputs);

    let mut diagnostics = Vec::new();
    for row in &rows {
        if !row.has_required_keys() {
            diagnostics.push(format!(
                "Row '{}' is missing a required key field",
                row.human_readable_name
            ));
        }
    }

    let path = own_artifact_path(ctx, provider, stage);
    artifacts::write_artifact(&path, stage.kind.as_str(), &rows).map_err(|e| e.to_string())?;

    let mut report = format!(
        "Fused {} database rows from {} raw models\n",
        rows.len(),
        models.len()
    );
    if !removed.is_empty() {
        report.push_str(&format!("\nRemoved by operator policy ({}):\n", removed.len()));
        for row in &removed {
            report.push_str(&format!("  {} ({})\n", row.canonical_slug, row.human_readable_name));
        }
    }
    Ok(StageSuccess::with_diagnostics(report, diagnostics))
}

#[derive(Debug, Serialize)]
struct CompareSummary {
    in_both: usize,
    pipeline_only: usize,
    supabase_only: usize,
    with_differences: usize,
}

async fn compare_working(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let db_path = artifact_path(ctx, provider, StageKind::FuseRecords)?;
    let rows: Vec<DbRow> = artifacts::read_models(&db_path).map_err(|e| e.to_string())?;

    let store = connect_store(ctx).await?;
    let current = store
        .read_slice(&ctx.config.pipeline.db.working_table, provider.as_str())
        .await
        .map_err(|e| e.to_string())?;

    let comparison = catalog_sync::compare::compare(&rows, &current);
    let summary = CompareSummary {
        in_both: comparison.in_both,
        pipeline_only: comparison.pipeline_only.len(),
        supabase_only: comparison.supabase_only.len(),
        with_differences: comparison.with_differences,
    };
    let path = own_artifact_path(ctx, provider, stage);
    artifacts::write_artifact(&path, stage.kind.as_str(), std::slice::from_ref(&summary))
        .map_err(|e| e.to_string())?;

    Ok(StageSuccess::clean(catalog_sync::compare::render_report(
        &comparison,
    )))
}

async fn refresh_working(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    _stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let db_path = artifact_path(ctx, provider, StageKind::FuseRecords)?;
    let rows: Vec<DbRow> = artifacts::read_models(&db_path).map_err(|e| e.to_string())?;

    let store = connect_store(ctx).await?;
    let db = &ctx.config.pipeline.db;
    let outcome = refresh::refresh_slice(
        &store,
        &db.working_table,
        provider.as_str(),
        &rows,
        db.insert_batch_size,
    )
    .await
    .map_err(|e| e.to_string())?;

    let mut report = format!(
        "Working-table refresh for {}\nFinal state: {}\nInitial: {}  Backed up: {}  Inserted: {}  Final: {}\n\nLog:\n",
        provider,
        outcome.state.as_report_str(),
        outcome.initial_count,
        outcome.backed_up,
        outcome.inserted,
        outcome.final_count
    );
    for line in &outcome.log {
        report.push_str(&format!("  {line}\n"));
    }

    if !outcome.succeeded() {
        // The whole protocol log rides in the error; the failure report
        // carries it so the end state is always on disk.
        return Err(format!(
            "Refresh ended in state {}\n\n{report}",
            outcome.state.as_report_str()
        ));
    }

    // Best-effort rate-limits table update, one row per model name.
    let mut seen = std::collections::HashSet::new();
    let mut limit_rows = Vec::new();
    for row in &rows {
        if seen.insert(row.human_readable_name.clone()) {
            limit_rows.push(parse_rate_limits(
                &row.rate_limits,
                &row.human_readable_name,
                &row.inference_provider,
            ));
        }
    }
    let limits_ok = refresh::update_rate_limits(
        &store,
        &db.rate_limits_table,
        provider.as_str(),
        &limit_rows,
    )
    .await;

    let mut diagnostics = Vec::new();
    if limits_ok {
        report.push_str(&format!("\nRate limits upserted: {}\n", limit_rows.len()));
    } else {
        diagnostics.push("Rate-limits table update failed (non-fatal)".to_string());
        report.push_str("\nRate-limits table update failed (non-fatal)\n");
    }
    Ok(StageSuccess::with_diagnostics(report, diagnostics))
}

async fn refresh_mapping(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    _stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let store = connect_store(ctx).await?;
    let db = &ctx.config.pipeline.db;

    let summary = catalog_sync::mapping::refresh_model_aa_mapping(
        &store,
        &db.working_table,
        &db.metrics_table,
        &db.mapping_table,
        Some(provider.as_str()),
        &ctx.provider_dir(provider),
    )
    .await
    .map_err(|e| e.to_string())?;

    let unmatched = summary.total_models - summary.matched;
    let report = format!(
        "Mapping refresh for {}\nModels: {}  Matched: {}  Unmatched: {}\nSee slugs_comparison.txt for candidates.\n",
        provider, summary.total_models, summary.matched, unmatched
    );
    let diagnostics = if unmatched > 0 {
        vec![format!("{unmatched} models have no performance-metric slug")]
    } else {
        Vec::new()
    };
    Ok(StageSuccess::with_diagnostics(report, diagnostics))
}

async fn promote_production(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    _stage: &StageConfig,
) -> Result<StageSuccess, String> {
    let store = connect_store(ctx).await?;
    let db = &ctx.config.pipeline.db;

    let outcome = promote::promote_slice(
        &store,
        &db.working_table,
        &db.production_table,
        provider.as_str(),
        db.promote_tolerance,
        db.insert_batch_size,
    )
    .await
    .map_err(|e| e.to_string())?;

    let mut report = format!(
        "Production promotion for {}\nFinal state: {}\nInserted: {}  Final: {}\n\nLog:\n",
        provider,
        outcome.state.as_report_str(),
        outcome.inserted,
        outcome.final_count
    );
    for line in &outcome.log {
        report.push_str(&format!("  {line}\n"));
    }

    if !outcome.succeeded() {
        return Err(format!(
            "Promotion ended in state {}\n\n{report}",
            outcome.state.as_report_str()
        ));
    }
    Ok(StageSuccess::clean(report))
}
