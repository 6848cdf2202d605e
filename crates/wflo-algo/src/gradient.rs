//! Finite-difference gradients of scalar objectives.
//!
//! Each perturbed evaluation is independent, so all of them run in parallel
//! with rayon. Results are collected in coordinate order, which keeps the
//! gradient deterministic.
//!
//! ```text
//! Forward:  ∂f/∂x_i ≈ (f(x + h·e_i) - f(x)) / h                 n evaluations
//! Central:  ∂f/∂x_i ≈ (f(x + h·e_i) - f(x - h·e_i)) / (2h)      2n evaluations
//! ```

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wflo_core::{WfloError, WfloResult};

/// Difference scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FiniteDifference {
    #[default]
    Forward,
    Central,
}

/// Finite-difference settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    pub scheme: FiniteDifference,
    /// Absolute perturbation, in the units of the design vector (meters)
    pub step: f64,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            scheme: FiniteDifference::Forward,
            step: 1e-2,
        }
    }
}

impl GradientConfig {
    pub fn validate(&self) -> WfloResult<()> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(WfloError::Config(format!(
                "finite-difference step must be positive, got {}",
                self.step
            )));
        }
        Ok(())
    }

    /// Objective evaluations per gradient for `n` variables
    pub fn evaluations(&self, n: usize) -> usize {
        match self.scheme {
            FiniteDifference::Forward => n,
            FiniteDifference::Central => 2 * n,
        }
    }
}

/// Gradient of `f` at `x`. `f0` is `f(x)`, reused by the forward scheme.
pub fn finite_difference_gradient<F>(
    f: F,
    x: &[f64],
    f0: f64,
    config: &GradientConfig,
) -> WfloResult<Vec<f64>>
where
    F: Fn(&[f64]) -> WfloResult<f64> + Sync,
{
    config.validate()?;
    let h = config.step;

    let grad: Vec<f64> = (0..x.len())
        .into_par_iter()
        .map(|i| -> WfloResult<f64> {
            let mut xp = x.to_vec();
            xp[i] += h;
            let fp = f(&xp)?;
            match config.scheme {
                FiniteDifference::Forward => Ok((fp - f0) / h),
                FiniteDifference::Central => {
                    xp[i] = x[i] - h;
                    let fm = f(&xp)?;
                    Ok((fp - fm) / (2.0 * h))
                }
            }
        })
        .collect::<WfloResult<Vec<f64>>>()?;

    if let Some(i) = grad.iter().position(|g| !g.is_finite()) {
        return Err(WfloError::numerical(format!(
            "finite-difference gradient is not finite in component {}",
            i
        )));
    }
    Ok(grad)
}
