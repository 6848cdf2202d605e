//! # Constrained Layout Optimization
//!
//! Moves turbines inside a boundary polygon to maximize farm AEP while
//! keeping a minimum pairwise spacing.
//!
//! ## Problem
//!
//! ```text
//! minimize    f(x) = -AEP(x)                         (GWh/year)
//! subject to  sd(p_i)            ≥ 0    ∀ i          (boundary)
//!             |p_i - p_j| - D_min ≥ 0   ∀ i < j      (spacing)
//! ```
//!
//! over the flat design vector `x = [x_0..x_{N-1}, y_0..y_{N-1}]`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐     ┌─────────────────────────┐
//! │ LayoutProblem      │     │ LayoutOptimizer (driver)│
//! │  AepEvaluator      │────►│  abort / timeout checks │
//! │  GeometryConstr.   │     │  best-feasible tracking │
//! │  seed, diagnostics │     │  convergence + trace    │
//! └────────────────────┘     └────────────┬────────────┘
//!                                         │ step()
//!                            ┌────────────▼────────────┐
//!                            │ dyn LayoutBackend       │
//!                            │  SqpBackend (Clarabel)  │
//!                            │  PenaltyLbfgsBackend    │
//!                            └─────────────────────────┘
//! ```
//!
//! The driver owns the iteration loop and the state machine
//! `Initialized → Iterating → {Converged, MaxIterExceeded, Infeasible,
//! Aborted}`. Backends only know how to take one step from an iterate.
//!
//! ## Example
//!
//! ```no_run
//! use wflo_algo::optimizer::{LayoutOptimizer, LayoutProblemBuilder, OptimizerConfig};
//! use wflo_algo::{TurbinePowerModel, WindResource};
//! use wflo_core::{BoundaryPolygon, Layout, Point};
//!
//! let problem = LayoutProblemBuilder::new(
//!     TurbinePowerModel::sg_8_0_167_dd()?,
//!     WindResource::uniform(12, 9.0, 2.0)?,
//! )
//! .boundary(BoundaryPolygon::rectangle(Point::new(0.0, 0.0), Point::new(2000.0, 2000.0))?)
//! .min_spacing(334.0)
//! .seed_layout(Layout::new(vec![Point::new(300.0, 300.0), Point::new(1700.0, 1700.0)]))
//! .build()?;
//!
//! let mut optimizer = LayoutOptimizer::new(OptimizerConfig::default())?;
//! let solution = optimizer.optimize(&problem)?;
//! println!("Optimized AEP: {:.2} GWh/year", solution.aep_gwh);
//! # Ok::<(), wflo_core::WfloError>(())
//! ```

pub mod backends;
mod problem;
mod solution;
mod solver;
mod traits;

pub use backends::{create_backend, PenaltyLbfgsBackend, SqpBackend};
pub use problem::{LayoutProblem, LayoutProblemBuilder};
pub use solution::{IterationRecord, LayoutSolution, OptimizationPhase};
pub use solver::{optimize_layout, LayoutOptimizer};
pub use traits::{Iterate, LayoutBackend, StepOutcome};

use crate::gradient::GradientConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wflo_core::{WfloError, WfloResult};

/// Layout optimization algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerAlgorithm {
    /// Sequential quadratic programming with Clarabel QP subproblems
    #[default]
    Sqp,
    /// Exterior quadratic penalty with argmin L-BFGS
    PenaltyLbfgs,
}

impl OptimizerAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqp => "sqp",
            Self::PenaltyLbfgs => "penalty-lbfgs",
        }
    }
}

impl std::fmt::Display for OptimizerAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OptimizerAlgorithm {
    type Err = WfloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqp" | "slsqp" => Ok(Self::Sqp),
            "penalty-lbfgs" | "penalty" | "lbfgs" => Ok(Self::PenaltyLbfgs),
            other => Err(WfloError::Config(format!(
                "unknown optimizer algorithm '{}' (expected sqp or penalty-lbfgs)",
                other
            ))),
        }
    }
}

/// Optimizer settings shared by the driver and all backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub algorithm: OptimizerAlgorithm,
    /// Maximum outer iterations
    pub max_iterations: usize,
    /// Relative objective change that counts as converged
    pub tolerance: f64,
    /// Largest constraint violation (m) that still counts as feasible
    pub constraint_tolerance: f64,
    /// Accepted steps shorter than this (m, max-norm) count as converged
    pub step_tolerance: f64,
    /// Finite-difference settings for the AEP gradient
    pub gradient: GradientConfig,
    /// Initial SQP trust-region radius (m); half a rotor diameter if unset
    pub trust_radius: Option<f64>,
    /// Largest SQP trust-region radius (m); four rotor diameters if unset
    pub max_trust_radius: Option<f64>,
    /// Lower bound on the ℓ1 merit penalty of the SQP backend
    pub penalty_floor: f64,
    /// Starting quadratic penalty μ of the penalty backend
    pub initial_penalty: f64,
    /// Factor applied to μ after each infeasible outer iteration
    pub penalty_growth: f64,
    /// L-BFGS iterations per outer penalty iteration
    pub inner_iterations: u64,
    /// Wall-clock budget; the best iterate so far is returned when exceeded
    pub timeout_seconds: Option<f64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            algorithm: OptimizerAlgorithm::Sqp,
            max_iterations: 20,
            tolerance: 1e-6,
            constraint_tolerance: 1e-3,
            step_tolerance: 1e-3,
            gradient: GradientConfig::default(),
            trust_radius: None,
            max_trust_radius: None,
            penalty_floor: 1.0,
            initial_penalty: 1000.0,
            penalty_growth: 10.0,
            inner_iterations: 25,
            timeout_seconds: None,
        }
    }
}

impl OptimizerConfig {
    pub fn with_algorithm(mut self, algorithm: OptimizerAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Reject settings no backend can work with
    pub fn validate(&self) -> WfloResult<()> {
        let positive = [
            ("tolerance", self.tolerance),
            ("constraint_tolerance", self.constraint_tolerance),
            ("step_tolerance", self.step_tolerance),
            ("penalty_floor", self.penalty_floor),
            ("initial_penalty", self.initial_penalty),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(WfloError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.penalty_growth.is_finite() && self.penalty_growth > 1.0) {
            return Err(WfloError::Config(format!(
                "penalty_growth must exceed 1, got {}",
                self.penalty_growth
            )));
        }
        for (name, value) in [
            ("trust_radius", self.trust_radius),
            ("max_trust_radius", self.max_trust_radius),
            ("timeout_seconds", self.timeout_seconds),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(WfloError::Config(format!(
                        "{} must be positive, got {}",
                        name, v
                    )));
                }
            }
        }
        self.gradient.validate()
    }
}

/// Shared flag that asks a running optimization to stop.
///
/// The driver checks it once per iteration boundary and returns the best
/// iterate found so far with phase [`OptimizationPhase::Aborted`].
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
