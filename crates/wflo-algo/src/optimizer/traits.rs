//! Backend contract for layout optimizers.
//!
//! A backend takes one step from the current iterate. The driver in
//! [`super::LayoutOptimizer`] decides acceptance bookkeeping, convergence and
//! termination, so backends stay small and interchangeable.

use super::{LayoutProblem, OptimizerConfig};
use crate::constraints::ConstraintEvaluation;
use wflo_core::WfloResult;

/// A design point with its objective and constraint values
#[derive(Debug, Clone, PartialEq)]
pub struct Iterate {
    /// Flat design vector `[x.., y..]`
    pub x: Vec<f64>,
    /// Negative AEP, GWh/year
    pub objective: f64,
    pub constraints: ConstraintEvaluation,
}

impl Iterate {
    pub fn aep_gwh(&self) -> f64 {
        -self.objective
    }

    pub fn is_feasible(&self, tolerance: f64) -> bool {
        self.constraints.is_feasible(tolerance)
    }

    /// `Σ max(0, -c_i)`
    pub fn total_violation(&self) -> f64 {
        self.constraints
            .values
            .iter()
            .map(|&c| (-c).max(0.0))
            .sum()
    }
}

/// Result of a single backend step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// New iterate when `accepted`, otherwise the unchanged current iterate
    pub iterate: Iterate,
    pub accepted: bool,
    /// Max-norm of the step actually taken (or attempted, if rejected)
    pub step_norm: f64,
    /// The backend cannot make further progress from here
    pub stalled: bool,
}

/// Implements one optimization algorithm (how to move the turbines).
///
/// Backends hold their own state between steps (quasi-Newton matrices,
/// penalty parameters, trust regions); `initialize` resets it for a new run.
pub trait LayoutBackend: Send {
    /// Unique identifier (e.g., "sqp", "penalty-lbfgs")
    fn id(&self) -> &str;

    /// Prepare internal state for a run starting at `start`
    fn initialize(
        &mut self,
        problem: &LayoutProblem,
        config: &OptimizerConfig,
        start: &Iterate,
    ) -> WfloResult<()>;

    /// Take one step from `current`
    fn step(
        &mut self,
        problem: &LayoutProblem,
        config: &OptimizerConfig,
        current: &Iterate,
    ) -> WfloResult<StepOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_trait_is_object_safe() {
        // This test passes if it compiles
        fn _accepts_backend(_b: &dyn LayoutBackend) {}
        fn _assert_send<T: Send>() {}
        _assert_send::<Box<dyn LayoutBackend>>();
    }

    #[test]
    fn test_iterate_violation() {
        let iterate = Iterate {
            x: vec![0.0, 0.0],
            objective: -12.5,
            constraints: ConstraintEvaluation {
                values: vec![3.0, -2.0, -0.5],
                max_boundary_violation: 2.0,
                max_spacing_violation: 0.5,
            },
        };
        assert_eq!(iterate.aep_gwh(), 12.5);
        assert_eq!(iterate.total_violation(), 2.5);
        assert!(!iterate.is_feasible(1e-3));
        assert!(iterate.is_feasible(2.0));
    }
}
