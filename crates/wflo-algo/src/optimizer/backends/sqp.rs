//! Sequential quadratic programming backend.
//!
//! Each step linearizes the constraints around the current layout and solves
//! an elastic trust-region QP with Clarabel:
//!
//! ```text
//! minimize    ½ dᵀB d + gᵀd + ρ Σ t_i
//! subject to  c(x) + J(x) d + t ≥ 0
//!             t ≥ 0
//!             -Δ ≤ d_j ≤ Δ
//! ```
//!
//! The slacks `t` keep the QP feasible even when the linearization is not
//! (seeds outside the boundary, overlapping turbines). Steps are globalized
//! with a backtracking line search on the ℓ1 merit function
//! `φ(x) = f(x) + ρ Σ max(0, -c_i(x))`, and `B` is a Powell-damped BFGS
//! approximation of the Lagrangian Hessian.
//!
//! ## Clarabel form
//!
//! Clarabel solves `min ½xᵀPx + qᵀx  s.t.  Ax + s = b, s ∈ K` over the
//! stacked variables `[d (n), t (m)]`. All rows live in one nonnegative cone:
//!
//! ```text
//! rows 0 .. m-1         [-J  -I] [d; t] + s = c        (linearized constraints)
//! rows m .. 2m-1        [ 0  -I] [d; t] + s = 0        (t ≥ 0)
//! rows 2m .. 2m+2n-1    [±e_j 0] [d; t] + s = Δ        (trust region box)
//! ```
//!
//! The duals of the first `m` rows are the constraint multipliers `λ ≥ 0`.

use crate::constraints::SparseJacobian;
use crate::optimizer::{Iterate, LayoutBackend, LayoutProblem, OptimizerConfig, StepOutcome};
use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, IPSolver, SupportedConeT},
};
use tracing::{debug, warn};
use wflo_core::{WfloError, WfloResult};

/// Sufficient-decrease constant of the merit line search
const ARMIJO: f64 = 1e-4;
/// Step halvings before a step is rejected
const MAX_BACKTRACKS: usize = 8;
/// Radius shrink factor after a rejected step
const REJECT_SHRINK: f64 = 0.25;

/// Solution of one QP subproblem
#[derive(Debug, Clone)]
struct QpStep {
    d: Vec<f64>,
    lambda: Vec<f64>,
}

/// SQP with Clarabel QP subproblems, ℓ1 merit line search and damped BFGS
#[derive(Debug, Clone, Default)]
pub struct SqpBackend {
    /// Dense BFGS approximation of the Lagrangian Hessian
    hessian: Vec<Vec<f64>>,
    /// Objective gradient and constraint Jacobian at `at`
    gradient: Vec<f64>,
    jacobian: Option<SparseJacobian>,
    at: Vec<f64>,
    radius: f64,
    max_radius: f64,
    merit_penalty: f64,
}

impl SqpBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current trust-region radius, meters
    pub fn trust_radius(&self) -> f64 {
        self.radius
    }

    /// Current ℓ1 merit penalty ρ
    pub fn merit_penalty(&self) -> f64 {
        self.merit_penalty
    }

    fn refresh_derivatives(
        &mut self,
        problem: &LayoutProblem,
        config: &OptimizerConfig,
        at: &Iterate,
    ) -> WfloResult<()> {
        self.gradient = problem.objective_gradient(&at.x, at.objective, &config.gradient)?;
        self.jacobian = Some(problem.constraint_jacobian(&at.x)?);
        self.at = at.x.clone();
        Ok(())
    }

    fn merit(&self, iterate: &Iterate) -> f64 {
        iterate.objective + self.merit_penalty * iterate.total_violation()
    }

    /// Powell-damped BFGS update with `s = x⁺ - x` and `y = ∇L⁺ - ∇L`
    fn update_hessian(&mut self, s: &[f64], y: &[f64]) {
        let bs = mat_vec(&self.hessian, s);
        let s_bs = dot(s, &bs);
        if s_bs <= 1e-16 {
            return;
        }
        let s_y = dot(s, y);
        let theta = if s_y >= 0.2 * s_bs {
            1.0
        } else {
            0.8 * s_bs / (s_bs - s_y)
        };
        let r: Vec<f64> = y
            .iter()
            .zip(&bs)
            .map(|(yi, bsi)| theta * yi + (1.0 - theta) * bsi)
            .collect();
        let s_r = dot(s, &r);
        if s_r <= 1e-16 {
            return;
        }
        for (i, row) in self.hessian.iter_mut().enumerate() {
            for (j, b) in row.iter_mut().enumerate() {
                *b += r[i] * r[j] / s_r - bs[i] * bs[j] / s_bs;
            }
        }
    }

    fn solve_qp(&self, constraint_values: &[f64]) -> WfloResult<QpStep> {
        let jacobian = self
            .jacobian
            .as_ref()
            .ok_or_else(|| WfloError::Solver("SQP backend used before initialize".into()))?;
        solve_elastic_qp(
            &self.hessian,
            &self.gradient,
            jacobian,
            constraint_values,
            self.radius,
            self.merit_penalty,
        )
    }
}

impl LayoutBackend for SqpBackend {
    fn id(&self) -> &str {
        "sqp"
    }

    fn initialize(
        &mut self,
        problem: &LayoutProblem,
        config: &OptimizerConfig,
        start: &Iterate,
    ) -> WfloResult<()> {
        let diameter = problem.rotor_diameter();
        self.radius = config.trust_radius.unwrap_or(0.5 * diameter);
        self.max_radius = config.max_trust_radius.unwrap_or(4.0 * diameter).max(self.radius);
        self.merit_penalty = config.penalty_floor;
        self.refresh_derivatives(problem, config, start)?;

        // B₀ = σI scaled so a steepest-descent step just fills the trust region
        let g_max = self.gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
        let sigma = (g_max / self.radius).max(1e-6);
        let n = start.x.len();
        self.hessian = (0..n)
            .map(|i| (0..n).map(|j| if i == j { sigma } else { 0.0 }).collect())
            .collect();
        Ok(())
    }

    fn step(
        &mut self,
        problem: &LayoutProblem,
        config: &OptimizerConfig,
        current: &Iterate,
    ) -> WfloResult<StepOutcome> {
        if self.at != current.x {
            self.refresh_derivatives(problem, config, current)?;
        }
        let feasible = current.is_feasible(config.constraint_tolerance);

        // ====================================================================
        // QP SUBPROBLEM
        // ====================================================================

        let qp = match self.solve_qp(&current.constraints.values) {
            Ok(qp) => qp,
            Err(e) => {
                warn!("SQP subproblem failed (radius {:.2} m): {}", self.radius, e);
                self.radius *= REJECT_SHRINK;
                return Ok(StepOutcome {
                    iterate: current.clone(),
                    accepted: false,
                    step_norm: 0.0,
                    stalled: self.radius < config.step_tolerance,
                });
            }
        };

        let lambda_max = qp.lambda.iter().fold(0.0_f64, |m, l| m.max(l.abs()));
        self.merit_penalty = self.merit_penalty.max(2.0 * lambda_max);
        let d_norm = qp.d.iter().fold(0.0_f64, |m, d| m.max(d.abs()));

        // ====================================================================
        // PREDICTED REDUCTION OF THE MERIT FUNCTION
        // ====================================================================

        let jacobian = self
            .jacobian
            .as_ref()
            .ok_or_else(|| WfloError::Solver("SQP backend used before initialize".into()))?;
        let linearized = jacobian.mul_vec(&qp.d);
        let violation_now = current.total_violation();
        let violation_lin: f64 = current
            .constraints
            .values
            .iter()
            .zip(&linearized)
            .map(|(c, jd)| (-(c + jd)).max(0.0))
            .sum();
        let model_decrease = -(dot(&self.gradient, &qp.d)
            + 0.5 * dot(&qp.d, &mat_vec(&self.hessian, &qp.d)));
        let predicted = model_decrease + self.merit_penalty * (violation_now - violation_lin);

        if predicted <= 1e-12 * current.objective.abs().max(1.0) {
            debug!("SQP: no predicted merit decrease (|d| = {:.3e} m)", d_norm);
            return Ok(StepOutcome {
                iterate: current.clone(),
                accepted: true,
                step_norm: 0.0,
                stalled: !feasible,
            });
        }

        // ====================================================================
        // BACKTRACKING LINE SEARCH ON φ
        // ====================================================================

        let merit_now = self.merit(current);
        let mut alpha = 1.0;
        let mut accepted = None;
        for _ in 0..=MAX_BACKTRACKS {
            let x_trial: Vec<f64> = current
                .x
                .iter()
                .zip(&qp.d)
                .map(|(x, d)| x + alpha * d)
                .collect();
            let trial = problem.evaluate_point(&x_trial)?;
            if self.merit(&trial) <= merit_now - ARMIJO * alpha * predicted {
                accepted = Some(trial);
                break;
            }
            alpha *= 0.5;
        }

        let Some(next) = accepted else {
            self.radius *= REJECT_SHRINK;
            debug!("SQP: step rejected, radius now {:.3} m", self.radius);
            return Ok(StepOutcome {
                iterate: current.clone(),
                accepted: false,
                step_norm: d_norm,
                stalled: self.radius < config.step_tolerance,
            });
        };

        // ====================================================================
        // QUASI-NEWTON UPDATE AND TRUST REGION
        // ====================================================================

        let lagrangian_before = lagrangian_gradient(&self.gradient, jacobian, &qp.lambda);
        self.refresh_derivatives(problem, config, &next)?;
        let jacobian = self
            .jacobian
            .as_ref()
            .ok_or_else(|| WfloError::Solver("SQP backend lost its Jacobian".into()))?;
        let lagrangian_after = lagrangian_gradient(&self.gradient, jacobian, &qp.lambda);

        let s: Vec<f64> = next.x.iter().zip(&current.x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = lagrangian_after
            .iter()
            .zip(&lagrangian_before)
            .map(|(a, b)| a - b)
            .collect();
        self.update_hessian(&s, &y);

        if alpha < 1.0 {
            self.radius *= 0.5;
        } else if d_norm >= 0.9 * self.radius {
            self.radius = (2.0 * self.radius).min(self.max_radius);
        }

        Ok(StepOutcome {
            iterate: next,
            accepted: true,
            step_norm: alpha * d_norm,
            stalled: false,
        })
    }
}

/// `∇f - Jᵀλ`
fn lagrangian_gradient(gradient: &[f64], jacobian: &SparseJacobian, lambda: &[f64]) -> Vec<f64> {
    let jt_lambda = jacobian.transpose_mul_vec(lambda);
    gradient.iter().zip(jt_lambda).map(|(g, jl)| g - jl).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

/// Assemble and solve the elastic trust-region QP
fn solve_elastic_qp(
    hessian: &[Vec<f64>],
    gradient: &[f64],
    jacobian: &SparseJacobian,
    constraint_values: &[f64],
    radius: f64,
    penalty: f64,
) -> WfloResult<QpStep> {
    let n = gradient.len();
    let m = constraint_values.len();
    let n_var = n + m;

    // ========================================================================
    // OBJECTIVE: P = blockdiag(B, 0) (upper triangle), q = [g; ρ1]
    // ========================================================================

    let mut p_col_ptr = vec![0usize];
    let mut p_row_idx = Vec::new();
    let mut p_values = Vec::new();
    for col in 0..n_var {
        if col < n {
            for (row, &b) in hessian.iter().take(col + 1).map(|r| &r[col]).enumerate() {
                if b != 0.0 {
                    p_row_idx.push(row);
                    p_values.push(b);
                }
            }
        }
        p_col_ptr.push(p_row_idx.len());
    }

    let mut obj = gradient.to_vec();
    obj.extend(std::iter::repeat(penalty).take(m));

    // ========================================================================
    // CONSTRAINTS (column-wise accumulation)
    // ========================================================================

    let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_var];
    let mut rhs: Vec<f64> = Vec::with_capacity(2 * m + 2 * n);

    // c + J d + t ≥ 0
    for (i, &c) in constraint_values.iter().enumerate() {
        for &(col, v) in jacobian.row(i) {
            rows[col].push((i, -v));
        }
        rows[n + i].push((i, -1.0));
        rhs.push(c);
    }

    // t ≥ 0
    for i in 0..m {
        rows[n + i].push((m + i, -1.0));
        rhs.push(0.0);
    }

    // |d_j| ≤ Δ
    for (j, col) in rows.iter_mut().enumerate().take(n) {
        let row = 2 * m + 2 * j;
        col.push((row, 1.0));
        col.push((row + 1, -1.0));
        rhs.push(radius);
        rhs.push(radius);
    }

    let n_con_rows = rhs.len();
    let cones = vec![SupportedConeT::NonnegativeConeT(n_con_rows)];

    let mut col_ptr = Vec::with_capacity(n_var + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for col in rows.iter_mut() {
        col_ptr.push(row_idx.len());
        col.sort_by_key(|(r, _)| *r);
        for &(r, v) in col.iter() {
            row_idx.push(r);
            values.push(v);
        }
    }
    col_ptr.push(row_idx.len());

    let a_mat = CscMatrix::new(n_con_rows, n_var, col_ptr, row_idx, values);
    let p_mat = CscMatrix::new(n_var, n_var, p_col_ptr, p_row_idx, p_values);

    // ========================================================================
    // SOLVE
    // ========================================================================

    let settings = DefaultSettingsBuilder::default()
        .verbose(false)
        .build()
        .map_err(|e| WfloError::Solver(format!("Clarabel settings error: {:?}", e)))?;

    let mut solver =
        clarabel::solver::DefaultSolver::new(&p_mat, &obj, &a_mat, &rhs, &cones, settings)
            .map_err(|e| WfloError::Solver(format!("Clarabel initialization failed: {:?}", e)))?;

    solver.solve();

    let sol = solver.solution;
    if !matches!(
        sol.status,
        clarabel::solver::SolverStatus::Solved | clarabel::solver::SolverStatus::AlmostSolved
    ) {
        return Err(WfloError::Solver(format!(
            "Clarabel returned status {:?} for the SQP subproblem",
            sol.status
        )));
    }

    let d = sol.x[..n].to_vec();
    if d.iter().any(|v| !v.is_finite()) {
        return Err(WfloError::numerical("SQP subproblem returned a non-finite step"));
    }
    let lambda = sol.z[..m].iter().map(|z| z.max(0.0)).collect();

    Ok(QpStep { d, lambda })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::LayoutProblemBuilder;
    use crate::resource::{SpeedBins, WindResource};
    use crate::turbine::TurbinePowerModel;
    use crate::wake::WakeModel;
    use wflo_core::{BoundaryPolygon, Layout, Point};

    fn identity(n: usize, sigma: f64) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { sigma } else { 0.0 }).collect())
            .collect()
    }

    #[test]
    fn test_qp_unconstrained_direction() {
        // one inactive constraint: d = -g/σ clipped to the box
        let jac = SparseJacobian::new(2, vec![vec![(0, 1.0)]]);
        let qp = solve_elastic_qp(&identity(2, 1.0), &[-0.5, 4.0], &jac, &[10.0], 2.0, 1.0).unwrap();
        assert!((qp.d[0] - 0.5).abs() < 1e-5, "{:?}", qp.d);
        assert!((qp.d[1] + 2.0).abs() < 1e-5, "{:?}", qp.d);
        assert!(qp.lambda[0].abs() < 1e-5);
    }

    #[test]
    fn test_qp_active_constraint_multiplier() {
        // minimize ½d² - d  s.t.  0 - d ≥ 0
        let jac = SparseJacobian::new(1, vec![vec![(0, -1.0)]]);
        let qp = solve_elastic_qp(&identity(1, 1.0), &[-1.0], &jac, &[0.0], 5.0, 10.0).unwrap();
        assert!(qp.d[0].abs() < 1e-5, "{:?}", qp.d);
        // stationarity: g - Jᵀλ = -1 + λ = 0
        assert!((qp.lambda[0] - 1.0).abs() < 1e-4, "{:?}", qp.lambda);
    }

    #[test]
    fn test_qp_restores_feasibility() {
        // c = -3 with J = [1]: need d ≥ 3, reachable inside Δ = 5
        let jac = SparseJacobian::new(1, vec![vec![(0, 1.0)]]);
        let qp = solve_elastic_qp(&identity(1, 1e-3), &[0.0], &jac, &[-3.0], 5.0, 100.0).unwrap();
        assert!(qp.d[0] >= 3.0 - 1e-4, "{:?}", qp.d);
    }

    #[test]
    fn test_damped_bfgs_keeps_curvature() {
        let mut backend = SqpBackend {
            hessian: identity(2, 1.0),
            ..SqpBackend::default()
        };
        // negative curvature pair would break plain BFGS
        backend.update_hessian(&[1.0, 0.0], &[-1.0, 0.0]);
        let h = &backend.hessian;
        assert!(h[0][0] > 0.0);
        assert!(h[0][0] * h[1][1] - h[0][1] * h[1][0] > 0.0);
    }

    #[test]
    fn test_step_moves_outside_turbine_in() {
        let problem = LayoutProblemBuilder::new(
            TurbinePowerModel::sg_8_0_167_dd().unwrap(),
            WindResource::uniform(4, 9.0, 2.0).unwrap(),
        )
        .wake_model(WakeModel::none())
        .speed_bins(SpeedBins::new(3.0, 25.0, 2.0).unwrap())
        .boundary(BoundaryPolygon::rectangle(Point::new(0.0, 0.0), Point::new(1000.0, 1000.0)).unwrap())
        .seed_layout(Layout::new(vec![Point::new(-40.0, 500.0), Point::new(600.0, 500.0)]))
        .build()
        .unwrap();
        let config = OptimizerConfig::default();
        let start = problem.evaluate_point(&problem.seed_layout().to_flat()).unwrap();

        let mut backend = SqpBackend::new();
        backend.initialize(&problem, &config, &start).unwrap();
        assert_eq!(backend.trust_radius(), 83.5);

        let outcome = backend.step(&problem, &config, &start).unwrap();
        assert!(outcome.accepted);
        assert!(outcome.iterate.constraints.max_boundary_violation < 1e-3);
        assert!(backend.merit_penalty() >= config.penalty_floor);
    }
}
