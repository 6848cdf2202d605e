//! Optimization driver.
//!
//! [`LayoutOptimizer`] runs the outer loop around a [`LayoutBackend`]:
//!
//! ```text
//! evaluate seed (iteration 0)
//! for k in 1..=max_iterations:
//!     abort requested or timeout?          → Aborted
//!     outcome = backend.step(current)
//!     accepted & feasible & small change?  → Converged
//!     backend stalled?                     → Converged if feasible, else as if exhausted
//! loop exhausted                           → MaxIterExceeded if any feasible iterate, else Infeasible
//! ```
//!
//! The driver remembers the best feasible iterate seen. Every outcome except
//! `Infeasible` returns that iterate, so a run that wanders off after finding
//! a good layout still hands it back.

use super::backends::create_backend;
use super::{
    AbortHandle, Iterate, IterationRecord, LayoutBackend, LayoutProblem, LayoutSolution,
    OptimizationPhase, OptimizerConfig,
};
use std::time::Duration;
use tracing::{debug, info, warn};
use web_time::Instant;
use wflo_core::{Layout, WfloResult};

/// Layout optimizer: configuration, a backend and an abort handle
pub struct LayoutOptimizer {
    config: OptimizerConfig,
    backend: Box<dyn LayoutBackend>,
    abort: AbortHandle,
}

impl std::fmt::Debug for LayoutOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutOptimizer")
            .field("config", &self.config)
            .field("backend", &self.backend.id())
            .finish()
    }
}

impl LayoutOptimizer {
    /// Create an optimizer with the backend selected by `config.algorithm`
    pub fn new(config: OptimizerConfig) -> WfloResult<Self> {
        let backend = create_backend(config.algorithm);
        Self::with_backend(config, backend)
    }

    /// Create an optimizer around a caller-supplied backend
    pub fn with_backend(config: OptimizerConfig, backend: Box<dyn LayoutBackend>) -> WfloResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            abort: AbortHandle::new(),
        })
    }

    /// Handle that stops a running [`optimize`](Self::optimize) at the next
    /// iteration boundary. Clones share the same flag.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    /// Optimize `problem` starting from its seed layout
    pub fn optimize(&mut self, problem: &LayoutProblem) -> WfloResult<LayoutSolution> {
        let start = Instant::now();
        let config = &self.config;
        let tol = config.constraint_tolerance;
        let timeout = config.timeout_seconds.map(Duration::from_secs_f64);

        // ====================================================================
        // INITIALIZATION
        // ====================================================================

        let initial = problem.evaluate_point(&problem.seed_layout().to_flat())?;
        let mut trace = vec![record(0, &initial, 0.0, true)];
        let mut best_feasible = initial.is_feasible(tol).then(|| initial.clone());
        let mut current = initial.clone();

        info!(
            "optimizing {} turbines with {} (seed AEP {:.3} GWh/year, max violation {:.2e} m)",
            problem.num_turbines(),
            self.backend.id(),
            initial.aep_gwh(),
            initial.constraints.max_violation()
        );

        self.backend.initialize(problem, config, &current)?;
        let mut phase = OptimizationPhase::Iterating;

        // ====================================================================
        // OUTER LOOP
        // ====================================================================

        let mut iterations = 0;
        let mut message = String::new();

        for k in 1..=config.max_iterations {
            if self.abort.is_aborted() {
                phase = OptimizationPhase::Aborted;
                message = "abort requested".to_string();
                break;
            }
            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    phase = OptimizationPhase::Aborted;
                    message = format!("timeout after {:.1} s", limit.as_secs_f64());
                    break;
                }
            }

            let outcome = self.backend.step(problem, config, &current)?;
            iterations = k;
            trace.push(record(k, &outcome.iterate, outcome.step_norm, outcome.accepted));

            debug!(
                "iter {:3}: AEP {:.4} GWh, boundary {:.2e} m, spacing {:.2e} m, step {:.3e} m{}",
                k,
                outcome.iterate.aep_gwh(),
                outcome.iterate.constraints.max_boundary_violation,
                outcome.iterate.constraints.max_spacing_violation,
                outcome.step_norm,
                if outcome.accepted { "" } else { " (rejected)" }
            );

            let previous_objective = current.objective;
            if outcome.accepted {
                current = outcome.iterate;
                if current.is_feasible(tol) {
                    let improves = best_feasible
                        .as_ref()
                        .map_or(true, |best| current.objective < best.objective);
                    if improves {
                        best_feasible = Some(current.clone());
                    }
                }
            }

            // ----------------------------------------------------------------
            // Convergence tests
            // ----------------------------------------------------------------

            let feasible = current.is_feasible(tol);
            if outcome.accepted && feasible {
                let relative_change = (current.objective - previous_objective).abs()
                    / previous_objective.abs().max(1.0);
                if relative_change < config.tolerance {
                    phase = OptimizationPhase::Converged;
                    message = format!("relative AEP change {:.2e} below tolerance", relative_change);
                    break;
                }
                if outcome.step_norm < config.step_tolerance {
                    phase = OptimizationPhase::Converged;
                    message = format!("step {:.2e} m below tolerance", outcome.step_norm);
                    break;
                }
            }

            if outcome.stalled {
                if feasible {
                    phase = OptimizationPhase::Converged;
                    message = "no further progress possible from a feasible layout".to_string();
                } else if best_feasible.is_some() {
                    phase = OptimizationPhase::MaxIterExceeded;
                    message = format!(
                        "backend stalled with constraint violation {:.2e} m, keeping best feasible layout",
                        current.constraints.max_violation()
                    );
                } else {
                    phase = OptimizationPhase::Infeasible;
                    message = format!(
                        "backend stalled with constraint violation {:.2e} m",
                        current.constraints.max_violation()
                    );
                }
                break;
            }
        }

        if !phase.is_terminal() {
            if best_feasible.is_some() {
                phase = OptimizationPhase::MaxIterExceeded;
                message = format!("reached {} iterations", config.max_iterations);
            } else {
                phase = OptimizationPhase::Infeasible;
                message = format!(
                    "no feasible layout within {} iterations (violation {:.2e} m)",
                    config.max_iterations,
                    current.constraints.max_violation()
                );
            }
        }

        // ====================================================================
        // BUILD SOLUTION
        // ====================================================================

        let result = match phase {
            OptimizationPhase::Infeasible => current,
            _ => best_feasible.unwrap_or(current),
        };

        let solution = LayoutSolution {
            phase,
            converged: phase == OptimizationPhase::Converged,
            layout: Layout::from_flat(&result.x)?,
            aep_gwh: result.aep_gwh(),
            initial_aep_gwh: initial.aep_gwh(),
            objective: result.objective,
            iterations,
            max_boundary_violation: result.constraints.max_boundary_violation,
            max_spacing_violation: result.constraints.max_spacing_violation,
            trace,
            backend: self.backend.id().to_string(),
            solve_time: start.elapsed(),
            message,
        };

        if solution.converged {
            info!("{}", solution.summary());
        } else {
            warn!("{}: {}", solution.summary(), solution.message);
        }

        Ok(solution)
    }
}

/// Optimize `problem` with a fresh optimizer built from `config`
pub fn optimize_layout(problem: &LayoutProblem, config: &OptimizerConfig) -> WfloResult<LayoutSolution> {
    LayoutOptimizer::new(config.clone())?.optimize(problem)
}

fn record(iteration: usize, iterate: &Iterate, step_norm: f64, accepted: bool) -> IterationRecord {
    IterationRecord {
        iteration,
        objective: iterate.objective,
        aep_gwh: iterate.aep_gwh(),
        max_boundary_violation: iterate.constraints.max_boundary_violation,
        max_spacing_violation: iterate.constraints.max_spacing_violation,
        step_norm,
        accepted,
    }
}
