//! Boundary containment and minimum spacing constraints.
//!
//! All constraint values follow the "≥ 0 feasible" convention and are
//! expressed in meters:
//!
//! ```text
//! rows 0 .. N-1          boundary:  c_i   = signed_distance(p_i)      (≥ 0 inside)
//! rows N .. N+P-1        spacing:   c_ij  = |p_i - p_j| - D_min      (i < j, row-major)
//! ```
//!
//! with `P = N(N-1)/2` pairs, or `P = 0` when `D_min = 0` (the spacing family
//! is dropped entirely). Jacobians are sparse over the flat design vector
//! `[x_0..x_{N-1}, y_0..y_{N-1}]`: a boundary row touches two columns, a
//! spacing row four.

use rayon::prelude::*;
use serde::Serialize;
use wflo_core::{x_index, y_index, BoundaryPolygon, Layout, Point, WfloError, WfloResult};

/// Turbine count above which spacing rows are evaluated in parallel
pub const PARALLEL_SPACING_THRESHOLD: usize = 64;

/// Sparse constraint Jacobian stored row-wise as `(column, value)` pairs
#[derive(Debug, Clone, PartialEq)]
pub struct SparseJacobian {
    n_cols: usize,
    rows: Vec<Vec<(usize, f64)>>,
}

impl SparseJacobian {
    pub fn new(n_cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Self {
        Self { n_cols, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, i: usize) -> &[(usize, f64)] {
        &self.rows[i]
    }

    pub fn rows(&self) -> &[Vec<(usize, f64)>] {
        &self.rows
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// `J · d`
    pub fn mul_vec(&self, d: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&(j, v)| v * d[j]).sum())
            .collect()
    }

    /// `Jᵀ · λ`
    pub fn transpose_mul_vec(&self, lambda: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.n_cols];
        for (row, &l) in self.rows.iter().zip(lambda) {
            for &(j, v) in row {
                out[j] += v * l;
            }
        }
        out
    }

    /// Dense row-major copy (tests and small problems)
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| {
                let mut dense = vec![0.0; self.n_cols];
                for &(j, v) in row {
                    dense[j] += v;
                }
                dense
            })
            .collect()
    }
}

/// Constraint values with their per-family worst violations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintEvaluation {
    pub values: Vec<f64>,
    /// Largest distance outside the boundary (0 when all turbines are inside)
    pub max_boundary_violation: f64,
    /// Largest shortfall below the minimum spacing
    pub max_spacing_violation: f64,
}

impl ConstraintEvaluation {
    pub fn max_violation(&self) -> f64 {
        self.max_boundary_violation.max(self.max_spacing_violation)
    }

    pub fn is_feasible(&self, tolerance: f64) -> bool {
        self.max_violation() <= tolerance
    }
}

/// Boundary and spacing constraints for a fixed turbine count
#[derive(Debug, Clone)]
pub struct GeometryConstraints {
    boundary: BoundaryPolygon,
    min_spacing: f64,
    n_turbines: usize,
}

impl GeometryConstraints {
    pub fn new(boundary: BoundaryPolygon, min_spacing: f64, n_turbines: usize) -> WfloResult<Self> {
        if !(min_spacing.is_finite() && min_spacing >= 0.0) {
            return Err(WfloError::input(format!(
                "minimum spacing must be finite and non-negative, got {}",
                min_spacing
            )));
        }
        if n_turbines == 0 {
            return Err(WfloError::input("constraints need at least one turbine"));
        }
        Ok(Self {
            boundary,
            min_spacing,
            n_turbines,
        })
    }

    pub fn boundary(&self) -> &BoundaryPolygon {
        &self.boundary
    }

    pub fn min_spacing(&self) -> f64 {
        self.min_spacing
    }

    pub fn num_turbines(&self) -> usize {
        self.n_turbines
    }

    pub fn num_boundary(&self) -> usize {
        self.n_turbines
    }

    /// Number of spacing rows; zero when the spacing family is disabled
    pub fn num_spacing(&self) -> usize {
        if self.min_spacing > 0.0 {
            self.n_turbines * (self.n_turbines - 1) / 2
        } else {
            0
        }
    }

    pub fn num_constraints(&self) -> usize {
        self.num_boundary() + self.num_spacing()
    }

    /// Row of the spacing constraint for pair `i < j`, relative to the
    /// start of the spacing block.
    pub fn pair_row(&self, i: usize, j: usize) -> usize {
        let n = self.n_turbines;
        i * (2 * n - i - 1) / 2 + (j - i - 1)
    }

    /// Signed distance of every turbine to the boundary
    pub fn boundary_values(&self, positions: &[Point]) -> Vec<f64> {
        positions
            .iter()
            .map(|p| self.boundary.signed_distance(p))
            .collect()
    }

    /// `|p_i - p_j| - D_min` for every pair `i < j`, row-major
    pub fn spacing_values(&self, positions: &[Point]) -> Vec<f64> {
        if self.min_spacing <= 0.0 {
            return Vec::new();
        }
        let n = positions.len();
        let xs: Vec<f64> = positions.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = positions.iter().map(|p| p.y).collect();
        let d_min = self.min_spacing;

        let row = |i: usize| -> Vec<f64> {
            ((i + 1)..n)
                .map(|j| (xs[i] - xs[j]).hypot(ys[i] - ys[j]) - d_min)
                .collect()
        };

        if n > PARALLEL_SPACING_THRESHOLD {
            (0..n).into_par_iter().map(row).collect::<Vec<_>>().concat()
        } else {
            (0..n).flat_map(row).collect()
        }
    }

    /// All constraint values of a flat design vector
    pub fn values(&self, x_flat: &[f64]) -> WfloResult<Vec<f64>> {
        Ok(self.evaluate(x_flat)?.values)
    }

    /// Constraint values plus worst violations
    pub fn evaluate(&self, x_flat: &[f64]) -> WfloResult<ConstraintEvaluation> {
        let layout = self.layout_of(x_flat)?;
        Ok(self.evaluate_layout(&layout))
    }

    pub fn evaluate_layout(&self, layout: &Layout) -> ConstraintEvaluation {
        let boundary = self.boundary_values(layout.positions());
        let spacing = self.spacing_values(layout.positions());
        let max_boundary_violation = worst_violation(&boundary);
        let max_spacing_violation = worst_violation(&spacing);

        let mut values = boundary;
        values.extend(spacing);
        ConstraintEvaluation {
            values,
            max_boundary_violation,
            max_spacing_violation,
        }
    }

    /// Largest violation (0 when feasible)
    pub fn max_violation(&self, x_flat: &[f64]) -> WfloResult<f64> {
        Ok(self.evaluate(x_flat)?.max_violation())
    }

    pub fn is_feasible(&self, x_flat: &[f64], tolerance: f64) -> WfloResult<bool> {
        Ok(self.evaluate(x_flat)?.is_feasible(tolerance))
    }

    /// Analytic Jacobian of [`Self::values`]
    pub fn jacobian(&self, x_flat: &[f64]) -> WfloResult<SparseJacobian> {
        let layout = self.layout_of(x_flat)?;
        let positions = layout.positions();
        let n = self.n_turbines;

        let mut rows: Vec<Vec<(usize, f64)>> = Vec::with_capacity(self.num_constraints());

        for (i, p) in positions.iter().enumerate() {
            let (_, g) = self.boundary.signed_distance_with_gradient(p);
            rows.push(vec![(x_index(i), g[0]), (y_index(i, n), g[1])]);
        }

        if self.min_spacing > 0.0 {
            let pair_rows = |i: usize| -> Vec<Vec<(usize, f64)>> {
                ((i + 1)..n)
                    .map(|j| {
                        let (ux, uy) = separation_direction(&positions[i], &positions[j]);
                        vec![
                            (x_index(i), ux),
                            (x_index(j), -ux),
                            (y_index(i, n), uy),
                            (y_index(j, n), -uy),
                        ]
                    })
                    .collect()
            };

            if n > PARALLEL_SPACING_THRESHOLD {
                let blocks: Vec<Vec<Vec<(usize, f64)>>> =
                    (0..n).into_par_iter().map(pair_rows).collect();
                rows.extend(blocks.into_iter().flatten());
            } else {
                rows.extend((0..n).flat_map(pair_rows));
            }
        }

        Ok(SparseJacobian::new(2 * n, rows))
    }

    fn layout_of(&self, x_flat: &[f64]) -> WfloResult<Layout> {
        if x_flat.len() != 2 * self.n_turbines {
            return Err(WfloError::input(format!(
                "design vector has length {}, expected {}",
                x_flat.len(),
                2 * self.n_turbines
            )));
        }
        Layout::from_flat(x_flat)
    }
}

/// Unit vector from `p_j` towards `p_i`; coincident pairs separate along +x
fn separation_direction(pi: &Point, pj: &Point) -> (f64, f64) {
    let (dx, dy) = pi.sub(pj);
    let d = dx.hypot(dy);
    if d > 0.0 {
        (dx / d, dy / d)
    } else {
        (1.0, 0.0)
    }
}

/// `max(0, -min c)`
fn worst_violation(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, &c| acc.max(-c))
}
