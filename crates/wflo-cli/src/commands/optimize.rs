use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use wflo_algo::{optimize_layout, LayoutSolution, OptimizationPhase, OptimizerAlgorithm};
use wflo_cli::config::ProblemFile;
use wflo_core::Diagnostics;

use crate::commands::util::{configure_threads, write_json};

// ============================================================================
// JSON Output Types for `optimize`
// ============================================================================

/// Problem summary for JSON output
#[derive(Debug, Clone, Serialize)]
struct ProblemSummary {
    turbine: String,
    turbines: usize,
    sectors: usize,
    wake_model: String,
    boundary_area_km2: f64,
    min_spacing: f64,
}

/// Full JSON output for `optimize`
#[derive(Debug, Clone, Serialize)]
struct OptimizeOutput {
    problem: ProblemSummary,
    threads: usize,
    aep_gain_percent: f64,
    solution: LayoutSolution,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    diagnostics: Vec<String>,
}

pub struct OptimizeArgs<'a> {
    pub problem: &'a Path,
    pub out: Option<&'a Path>,
    pub max_iterations: Option<usize>,
    pub algorithm: Option<&'a str>,
    pub timeout: Option<f64>,
    pub threads: &'a str,
}

pub fn handle(args: OptimizeArgs<'_>) -> Result<()> {
    let threads = configure_threads(args.threads)?;
    let file = ProblemFile::load(args.problem)?;

    let mut config = file.optimizer.clone();
    if let Some(n) = args.max_iterations {
        config.max_iterations = n;
    }
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm.parse::<OptimizerAlgorithm>()?;
    }
    if let Some(seconds) = args.timeout {
        config = config.with_timeout(seconds);
    }

    let problem = file
        .build_problem()
        .with_context(|| format!("building layout problem from {}", args.problem.display()))?;
    let summary = ProblemSummary {
        turbine: problem.evaluator().turbine().name().to_string(),
        turbines: problem.num_turbines(),
        sectors: problem.evaluator().resource().num_sectors(),
        wake_model: problem.evaluator().wake_model().to_string(),
        boundary_area_km2: problem.constraints().boundary().area() / 1e6,
        min_spacing: problem.constraints().min_spacing(),
    };
    info!(
        "Optimizing {} x {} with {} (max {} iterations, {} threads)",
        summary.turbines, summary.turbine, config.algorithm, config.max_iterations, threads
    );

    let solution = optimize_layout(&problem, &config).context("layout optimization failed")?;

    println!("{}", solution.summary());
    println!("Initial AEP: {:.2} GWh/year", solution.initial_aep_gwh);
    println!("Optimized AEP: {:.2} GWh/year", solution.aep_gwh);
    if solution.phase == OptimizationPhase::Aborted {
        warn!("{}", solution.message);
    }

    let phase = solution.phase;
    let max_violation = solution.max_violation();
    if let Some(out) = args.out {
        let output = OptimizeOutput {
            problem: summary,
            threads,
            aep_gain_percent: solution.aep_gain_percent(),
            solution,
            diagnostics: issue_lines(problem.diagnostics()),
        };
        write_json(out, &output)?;
        info!("Optimization result written to {}", out.display());
    }

    if phase == OptimizationPhase::Infeasible {
        bail!(
            "no feasible layout found (max constraint violation {:.3} m)",
            max_violation
        );
    }
    Ok(())
}

fn issue_lines(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics.issues.iter().map(ToString::to_string).collect()
}
