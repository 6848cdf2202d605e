//! Optimizer results and per-iteration trace.

use serde::Serialize;
use std::time::Duration;
use wflo_core::Layout;

/// Optimizer state machine
///
/// ```text
/// Initialized ──► Iterating ──┬──► Converged
///                             ├──► MaxIterExceeded
///                             ├──► Infeasible
///                             └──► Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizationPhase {
    Initialized,
    Iterating,
    Converged,
    MaxIterExceeded,
    Infeasible,
    /// Stopped by an abort request or the wall-clock budget
    Aborted,
}

impl OptimizationPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initialized | Self::Iterating)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Iterating => "iterating",
            Self::Converged => "converged",
            Self::MaxIterExceeded => "max-iter-exceeded",
            Self::Infeasible => "infeasible",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for OptimizationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the optimization trace (iteration 0 is the seed)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub objective: f64,
    pub aep_gwh: f64,
    pub max_boundary_violation: f64,
    pub max_spacing_violation: f64,
    pub step_norm: f64,
    pub accepted: bool,
}

/// Final result of a layout optimization
#[derive(Debug, Clone, Serialize)]
pub struct LayoutSolution {
    pub phase: OptimizationPhase,
    pub converged: bool,
    pub layout: Layout,
    pub aep_gwh: f64,
    /// AEP of the seed layout
    pub initial_aep_gwh: f64,
    /// Final objective (negative AEP)
    pub objective: f64,
    pub iterations: usize,
    pub max_boundary_violation: f64,
    pub max_spacing_violation: f64,
    pub trace: Vec<IterationRecord>,
    /// Backend identifier
    pub backend: String,
    #[serde(with = "duration_secs")]
    pub solve_time: Duration,
    pub message: String,
}

impl LayoutSolution {
    /// A usable layout came out (converged, or ran out of iterations while feasible)
    pub fn is_success(&self) -> bool {
        matches!(
            self.phase,
            OptimizationPhase::Converged | OptimizationPhase::MaxIterExceeded
        )
    }

    /// Relative AEP change from the seed layout, percent
    pub fn aep_gain_percent(&self) -> f64 {
        if self.initial_aep_gwh.abs() <= f64::EPSILON {
            return 0.0;
        }
        100.0 * (self.aep_gwh - self.initial_aep_gwh) / self.initial_aep_gwh
    }

    pub fn max_violation(&self) -> f64 {
        self.max_boundary_violation.max(self.max_spacing_violation)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} after {} iterations ({}): AEP {:.3} GWh/year ({:+.2}% vs seed), max violation {:.2e} m",
            self.phase,
            self.iterations,
            self.backend,
            self.aep_gwh,
            self.aep_gain_percent(),
            self.max_violation()
        )
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wflo_core::Point;

    fn solution(phase: OptimizationPhase) -> LayoutSolution {
        LayoutSolution {
            phase,
            converged: phase == OptimizationPhase::Converged,
            layout: Layout::new(vec![Point::new(0.0, 0.0)]),
            aep_gwh: 110.0,
            initial_aep_gwh: 100.0,
            objective: -110.0,
            iterations: 4,
            max_boundary_violation: 0.0,
            max_spacing_violation: 2e-4,
            trace: Vec::new(),
            backend: "sqp".to_string(),
            solve_time: Duration::from_millis(1500),
            message: String::new(),
        }
    }

    #[test]
    fn test_phase_classification() {
        assert!(!OptimizationPhase::Iterating.is_terminal());
        assert!(OptimizationPhase::Aborted.is_terminal());
        assert!(solution(OptimizationPhase::MaxIterExceeded).is_success());
        assert!(!solution(OptimizationPhase::Infeasible).is_success());
        assert_eq!(OptimizationPhase::MaxIterExceeded.to_string(), "max-iter-exceeded");
    }

    #[test]
    fn test_gain_and_summary() {
        let s = solution(OptimizationPhase::Converged);
        assert!((s.aep_gain_percent() - 10.0).abs() < 1e-12);
        assert_eq!(s.max_violation(), 2e-4);
        assert!(s.summary().starts_with("converged after 4 iterations"));
    }

    #[test]
    fn test_serializes_duration_as_seconds() {
        let json = serde_json::to_value(solution(OptimizationPhase::Converged)).unwrap();
        assert_eq!(json["solve_time"], 1.5);
        assert_eq!(json["phase"], "converged");
    }
}
