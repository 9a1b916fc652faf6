mod report;
mod stages;

pub use report::render_run_report;

use std::path::PathBuf;
use std::time::Duration;

use catalog_common::config::{StageConfig, StageKind};
use catalog_common::credentials::Credentials;
use catalog_common::types::InferenceProvider;
use catalog_common::RunId;
use catalog_fetch::{DomainRateLimiter, FetchClient, UrlCache};
use catalog_sync::RefreshState;
use tokio::sync::Mutex;

use crate::config::EngineConfig;

/// Everything a stage needs, built once at startup and passed explicitly.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub credentials: Credentials,
    pub fetch: FetchClient,
    pub limiter: DomainRateLimiter,
    pub cache: Mutex<UrlCache>,
    pub outputs_root: PathBuf,
}

impl PipelineContext {
    pub async fn new(
        config: EngineConfig,
        credentials: Credentials,
        outputs_root: PathBuf,
    ) -> Result<Self, String> {
        let fetch = FetchClient::new(&config.pipeline.http)
            .await
            .map_err(|e| e.to_string())?;
        let limiter = DomainRateLimiter::new(config.pipeline.http.rate_limit_per_second);
        let cache = Mutex::new(UrlCache::new(Duration::from_secs(3600)));

        Ok(Self {
            config,
            credentials,
            fetch,
            limiter,
            cache,
            outputs_root,
        })
    }

    /// Per-provider outputs directory.
    pub fn provider_dir(&self, provider: InferenceProvider) -> PathBuf {
        self.outputs_root.join(provider.as_key())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageStatus {
    Success,
    /// Completed with degraded results (fallbacks, preserved artifacts).
    Warning,
    Failed,
    /// Not run because an earlier required stage failed.
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// One stage's result in the run report.
#[derive(Clone, Debug)]
pub struct StageOutcome {
    pub letter: String,
    pub kind: StageKind,
    pub required: bool,
    pub status: StageStatus,
    pub duration: Duration,
    pub diagnostics: Vec<String>,
}

/// The whole run, written to `Z-run-report.txt` and summarized on exit.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub provider: InferenceProvider,
    pub total_duration: Duration,
    pub stages: Vec<StageOutcome>,
}

impl RunReport {
    /// Exit code 0 only when no required stage failed.
    pub fn succeeded(&self) -> bool {
        !self
            .stages
            .iter()
            .any(|s| s.required && s.status == StageStatus::Failed)
    }

    pub fn first_failed_required(&self) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|s| s.required && s.status == StageStatus::Failed)
    }
}

/// How the operator picked stages on the command line.
#[derive(Clone, Debug, Default)]
pub struct StageSelection {
    pub auto_all: bool,
    pub scripts: Vec<String>,
    pub range: Option<(String, String)>,
}

/// Resolve the selection against a provider's ordered plan.
pub fn select_stages(
    plan: &[StageConfig],
    selection: &StageSelection,
) -> Result<Vec<StageConfig>, String> {
    if !selection.scripts.is_empty() {
        let wanted: Vec<String> = selection.scripts.iter().map(|s| s.to_uppercase()).collect();
        for letter in &wanted {
            if !plan.iter().any(|s| s.letter == *letter) {
                return Err(format!("Unknown stage letter '{letter}'"));
            }
        }
        return Ok(plan
            .iter()
            .filter(|s| wanted.contains(&s.letter))
            .cloned()
            .collect());
    }

    if let Some((start, end)) = &selection.range {
        let start = start.to_uppercase();
        let end = end.to_uppercase();
        let start_index = plan
            .iter()
            .position(|s| s.letter == start)
            .ok_or_else(|| format!("Unknown range start '{start}'"))?;
        let end_index = plan
            .iter()
            .position(|s| s.letter == end)
            .ok_or_else(|| format!("Unknown range end '{end}'"))?;
        if end_index < start_index {
            return Err(format!("Range '{start}'..'{end}' is reversed"));
        }
        return Ok(plan[start_index..=end_index].to_vec());
    }

    // --auto-all, and the non-interactive default.
    if selection.auto_all {
        tracing::debug!("--auto-all: selecting every auto stage");
    }
    Ok(plan.iter().filter(|s| s.auto).cloned().collect())
}

/// The provider-refresh lifecycle state a stage kind corresponds to.
/// The sync engine drives the Backing-Up..Done segment itself.
fn lifecycle_state(kind: StageKind) -> Option<RefreshState> {
    match kind {
        StageKind::FetchApiModels
        | StageKind::FilterModels
        | StageKind::ScrapeModels
        | StageKind::ScrapeRateLimits
        | StageKind::ScrapeModalities => Some(RefreshState::ExtractingExternal),
        StageKind::ResolveLicenses | StageKind::NormalizeModalities => {
            Some(RefreshState::Resolving)
        }
        StageKind::FuseRecords => Some(RefreshState::Fusing),
        StageKind::RefreshWorking => Some(RefreshState::BackingUp),
        StageKind::CompareWorking
        | StageKind::RefreshMapping
        | StageKind::PromoteProduction => None,
    }
}

/// Run the selected stages for one provider in plan order. A required
/// failure aborts; the remaining stages are reported skipped.
pub async fn run_provider(
    ctx: &PipelineContext,
    provider: InferenceProvider,
    selection: &StageSelection,
) -> Result<RunReport, String> {
    let run_id = RunId::new();
    let plan = ctx
        .config
        .pipeline
        .providers
        .get(provider.as_key())
        .ok_or_else(|| format!("No stage plan configured for provider '{}'", provider.as_key()))?;
    let selected = select_stages(&plan.stages, selection)?;
    if selected.is_empty() {
        return Err("Stage selection is empty".to_string());
    }

    let span = tracing::info_span!("pipeline", provider = provider.as_str(), run_id = %run_id);
    let _enter = span.enter();
    tracing::info!(stages = selected.len(), "Pipeline run starting");

    let stage_timeout =
        Duration::from_secs(ctx.config.pipeline.orchestrator.stage_timeout_minutes * 60);
    let run_start = std::time::Instant::now();

    let mut outcomes = Vec::new();
    let mut aborted = false;

    let mut lifecycle = RefreshState::Idle;

    for stage in &selected {
        if aborted {
            outcomes.push(StageOutcome {
                letter: stage.letter.clone(),
                kind: stage.kind,
                required: stage.required,
                status: StageStatus::Skipped,
                duration: Duration::ZERO,
                diagnostics: vec!["Skipped after a required-stage failure".to_string()],
            });
            continue;
        }

        let next_state = lifecycle_state(stage.kind).unwrap_or(lifecycle);
        if next_state != lifecycle {
            tracing::info!(
                from = lifecycle.as_report_str(),
                to = next_state.as_report_str(),
                "Refresh lifecycle transition"
            );
            lifecycle = next_state;
        }

        tracing::info!(letter = %stage.letter, kind = stage.kind.as_str(), "Stage starting");
        let stage_start = std::time::Instant::now();

        // The watchdog is observed between stages and at HTTP suspension
        // points; an in-flight DB transaction completes naturally.
        let result = tokio::time::timeout(
            stage_timeout,
            stages::run_stage(ctx, provider, stage),
        )
        .await;

        let duration = stage_start.elapsed();
        let outcome = match result {
            Ok(Ok(success)) => StageOutcome {
                letter: stage.letter.clone(),
                kind: stage.kind,
                required: stage.required,
                status: if success.warning {
                    StageStatus::Warning
                } else {
                    StageStatus::Success
                },
                duration,
                diagnostics: success.diagnostics,
            },
            Ok(Err(error)) => StageOutcome {
                letter: stage.letter.clone(),
                kind: stage.kind,
                required: stage.required,
                status: StageStatus::Failed,
                duration,
                diagnostics: vec![error],
            },
            Err(_) => StageOutcome {
                letter: stage.letter.clone(),
                kind: stage.kind,
                required: stage.required,
                status: StageStatus::Failed,
                duration,
                diagnostics: vec![format!(
                    "Stage timed out after {} minutes",
                    ctx.config.pipeline.orchestrator.stage_timeout_minutes
                )],
            },
        };

        match outcome.status {
            StageStatus::Success => {
                tracing::info!(letter = %outcome.letter, duration_ms = duration.as_millis() as u64, "Stage complete")
            }
            StageStatus::Warning => {
                tracing::warn!(letter = %outcome.letter, "Stage completed with warnings")
            }
            StageStatus::Failed => {
                tracing::error!(letter = %outcome.letter, diagnostics = ?outcome.diagnostics, "Stage failed");
                metrics::counter!("catalog.pipeline.stage_failed").increment(1);
                if outcome.required {
                    aborted = true;
                }
            }
            StageStatus::Skipped => {}
        }
        outcomes.push(outcome);
    }

    let report = RunReport {
        run_id,
        provider,
        total_duration: run_start.elapsed(),
        stages: outcomes,
    };

    let rendered = render_run_report(&report);
    let report_path = ctx.provider_dir(provider).join("Z-run-report.txt");
    if let Err(e) = catalog_extract::artifacts::write_report(&report_path, &rendered) {
        tracing::warn!(error = %e, "Could not write run report");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<StageConfig> {
        ["A", "B", "C", "D"]
            .iter()
            .enumerate()
            .map(|(index, letter)| StageConfig {
                letter: letter.to_string(),
                kind: StageKind::FetchApiModels,
                required: true,
                // C is excluded from auto runs.
                auto: index != 2,
            })
            .collect()
    }

    #[test]
    fn test_select_auto_all() {
        let selected = select_stages(&plan(), &StageSelection::default()).unwrap();
        let letters: Vec<&str> = selected.iter().map(|s| s.letter.as_str()).collect();
        assert_eq!(letters, vec!["A", "B", "D"]);
    }

    #[test]
    fn test_select_scripts() {
        let selection = StageSelection {
            scripts: vec!["c".to_string(), "a".to_string()],
            ..StageSelection::default()
        };
        let selected = select_stages(&plan(), &selection).unwrap();
        // Plan order, not selection order.
        let letters: Vec<&str> = selected.iter().map(|s| s.letter.as_str()).collect();
        assert_eq!(letters, vec!["A", "C"]);
    }

    #[test]
    fn test_select_range() {
        let selection = StageSelection {
            range: Some(("B".to_string(), "D".to_string())),
            ..StageSelection::default()
        };
        let selected = select_stages(&plan(), &selection).unwrap();
        let letters: Vec<&str> = selected.iter().map(|s| s.letter.as_str()).collect();
        assert_eq!(letters, vec!["B", "C", "D"]);
    }

    #[test]
    fn test_select_unknown_letter() {
        let selection = StageSelection {
            scripts: vec!["Q".to_string()],
            ..StageSelection::default()
        };
        assert!(select_stages(&plan(), &selection).is_err());
    }

    #[test]
    fn test_select_reversed_range() {
        let selection = StageSelection {
            range: Some(("D".to_string(), "A".to_string())),
            ..StageSelection::default()
        };
        assert!(select_stages(&plan(), &selection).is_err());
    }
}
