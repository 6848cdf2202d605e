use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;
use wflo_algo::AepReport;
use wflo_cli::config::ProblemFile;
use wflo_cli::WakeKind;
use wflo_core::Layout;

use crate::commands::util::{configure_threads, write_json};

// ============================================================================
// JSON Output Types for `aep`
// ============================================================================

/// Wake model block for JSON output
#[derive(Debug, Clone, Serialize)]
struct WakeSummary {
    deficit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expansion: Option<f64>,
    superposition: &'static str,
}

/// Full JSON output for `aep`
#[derive(Debug, Clone, Serialize)]
struct AepOutput {
    turbine: String,
    sectors: usize,
    wake: WakeSummary,
    aep_gwh: f64,
    wake_loss_percent: f64,
    capacity_factor: f64,
    report: AepReport,
    layout: Layout,
}

pub fn handle(
    problem: &Path,
    model: Option<WakeKind>,
    out: Option<&Path>,
    threads: &str,
) -> Result<()> {
    configure_threads(threads)?;
    let file = ProblemFile::load(problem)?;
    let layout = file.seed_layout()?;
    let evaluator = file.evaluator(model)?;
    let wake = *evaluator.wake_model();

    info!(
        "Evaluating AEP of {} turbines ({} wake, {} sectors)",
        layout.len(),
        wake,
        evaluator.resource().num_sectors()
    );
    let report = evaluator
        .evaluate(&layout)
        .context("evaluating AEP of the seed layout")?;

    println!("Turbine  x [m]        y [m]        AEP [GWh/year]");
    for (i, (p, gwh)) in layout.iter().zip(&report.per_turbine_gwh).enumerate() {
        println!("{:<8} {:<12.1} {:<12.1} {:.3}", i, p.x, p.y, gwh);
    }
    println!(
        "AEP: {:.2} GWh/year (wake loss {:.2}%, capacity factor {:.1}%)",
        report.total_gwh,
        report.wake_loss_percent(),
        100.0 * report.capacity_factor()
    );

    if let Some(out) = out {
        let output = AepOutput {
            turbine: evaluator.turbine().name().to_string(),
            sectors: evaluator.resource().num_sectors(),
            wake: WakeSummary {
                deficit: wake.deficit.name(),
                expansion: wake.deficit.expansion(),
                superposition: wake.superposition.name(),
            },
            aep_gwh: report.total_gwh,
            wake_loss_percent: report.wake_loss_percent(),
            capacity_factor: report.capacity_factor(),
            report,
            layout,
        };
        write_json(out, &output)?;
        info!("AEP report written to {}", out.display());
    }
    Ok(())
}
