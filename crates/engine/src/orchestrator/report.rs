use super::{RunReport, StageStatus};

/// How many trailing diagnostic lines a failing stage contributes to the
/// run report.
const DIAGNOSTIC_TAIL: usize = 10;

/// Render the final pipeline run report.
pub fn render_run_report(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(70));
    out.push_str(&format!(
        "\nPIPELINE RUN REPORT: {}\nRun id: {}\nTotal time: {:.1}s\n",
        report.provider,
        report.run_id,
        report.total_duration.as_secs_f64()
    ));
    out.push_str(&"=".repeat(70));
    out.push_str("\n\nStages:\n");

    for stage in &report.stages {
        out.push_str(&format!(
            "  {} {:<24} {:<8} {:.1}s\n",
            stage.letter,
            stage.kind.as_str(),
            stage.status.as_str(),
            stage.duration.as_secs_f64()
        ));
    }
    out.push('\n');

    if let Some(failed) = report.first_failed_required() {
        out.push_str(&format!(
            "FIRST FAILING REQUIRED STAGE: {} ({})\n",
            failed.letter,
            failed.kind.as_str()
        ));
        let skipped: Vec<&str> = report
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Skipped)
            .map(|s| s.letter.as_str())
            .collect();
        if !skipped.is_empty() {
            out.push_str(&format!("Skipped stages: {}\n", skipped.join(", ")));
        }
        out.push('\n');
    }

    for stage in &report.stages {
        if stage.status == StageStatus::Failed || stage.status == StageStatus::Warning {
            out.push_str(&format!(
                "--- {} {} diagnostics (last {}) ---\n",
                stage.letter,
                stage.kind.as_str(),
                DIAGNOSTIC_TAIL
            ));
            let start = stage.diagnostics.len().saturating_sub(DIAGNOSTIC_TAIL);
            for line in &stage.diagnostics[start..] {
                out.push_str(&format!("  {line}\n"));
            }
            out.push('\n');
        }
    }

    out.push_str(if report.succeeded() {
        "RESULT: SUCCESS\n"
    } else {
        "RESULT: FAILED\n"
    });
    out
}
