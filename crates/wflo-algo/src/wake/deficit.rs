//! Single-wake velocity deficit shapes.
//!
//! All shapes return the fractional deficit δ ∈ [0, 1] a source turbine
//! with thrust coefficient C_T imposes at a point `x` meters downstream and
//! `r` meters off the wake centerline. The effective speed in a single wake
//! is `U · (1 - δ)`.

use crate::turbine::MAX_THRUST_COEFFICIENT;
use serde::{Deserialize, Serialize};

/// Default wake expansion coefficient of the top-hat model
pub const DEFAULT_TOP_HAT_K: f64 = 0.1;

/// Default wake expansion coefficient of the Gaussian model
pub const DEFAULT_GAUSSIAN_K: f64 = 0.04;

/// Wake deficit shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeficitModel {
    /// Jensen (1983) top-hat wake with linear expansion
    TopHat { k: f64 },
    /// Bastankhah & Porté-Agel (2014) Gaussian wake
    Gaussian { k: f64 },
    /// No wake interaction (free-stream baseline)
    NoWake,
}

impl Default for DeficitModel {
    fn default() -> Self {
        Self::gaussian()
    }
}

impl DeficitModel {
    pub fn top_hat() -> Self {
        Self::TopHat {
            k: DEFAULT_TOP_HAT_K,
        }
    }

    pub fn gaussian() -> Self {
        Self::Gaussian {
            k: DEFAULT_GAUSSIAN_K,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TopHat { .. } => "top-hat",
            Self::Gaussian { .. } => "gaussian",
            Self::NoWake => "none",
        }
    }

    /// Wake expansion coefficient, `None` for [`DeficitModel::NoWake`]
    pub fn expansion(&self) -> Option<f64> {
        match self {
            Self::TopHat { k } | Self::Gaussian { k } => Some(*k),
            Self::NoWake => None,
        }
    }

    /// Deficit at `x_down` meters downstream and `r_cross` meters from the
    /// centerline. Zero for points that are not downstream.
    pub fn deficit(&self, x_down: f64, r_cross: f64, ct: f64, diameter: f64) -> f64 {
        if !(x_down > 0.0) {
            return 0.0;
        }
        let ct = ct.clamp(0.0, MAX_THRUST_COEFFICIENT);
        match *self {
            Self::TopHat { k } => top_hat(x_down, r_cross.abs(), ct, diameter, k),
            Self::Gaussian { k } => gaussian(x_down, r_cross.abs(), ct, diameter, k),
            Self::NoWake => 0.0,
        }
    }

    /// Limit of the deficit for `x → 0⁺` on the centerline. Applied to
    /// coincident turbines in place of the singular pair geometry.
    pub fn max_deficit(&self, ct: f64, diameter: f64) -> f64 {
        let ct = ct.clamp(0.0, MAX_THRUST_COEFFICIENT);
        match *self {
            Self::TopHat { k } => top_hat(0.0, 0.0, ct, diameter, k),
            Self::Gaussian { k } => gaussian(0.0, 0.0, ct, diameter, k),
            Self::NoWake => 0.0,
        }
    }
}

/// `(1 - √(1 - C_T)) · (D / (D + 2kx))²` inside `r < D/2 + kx`
fn top_hat(x: f64, r: f64, ct: f64, diameter: f64, k: f64) -> f64 {
    let wake_radius = 0.5 * diameter + k * x;
    if r >= wake_radius {
        return 0.0;
    }
    let ratio = diameter / (diameter + 2.0 * k * x);
    ((1.0 - (1.0 - ct).sqrt()) * ratio * ratio).clamp(0.0, 1.0)
}

/// Gaussian deficit with the characteristic wake width
/// `σ/D = k·x/D + 0.2·√β`, `β = ½(1 + √(1 - C_T)) / √(1 - C_T)`.
fn gaussian(x: f64, r: f64, ct: f64, diameter: f64, k: f64) -> f64 {
    let sqrt_1m_ct = (1.0 - ct).sqrt();
    let beta = 0.5 * (1.0 + sqrt_1m_ct) / sqrt_1m_ct;
    let sigma_d = k * x / diameter + 0.2 * beta.sqrt();

    // Negative radicand in the near wake: centerline deficit saturates
    let radicand = 1.0 - ct / (8.0 * sigma_d * sigma_d);
    let centerline = if radicand > 0.0 {
        1.0 - radicand.sqrt()
    } else {
        1.0
    };

    let sigma = sigma_d * diameter;
    let shape = (-(r * r) / (2.0 * sigma * sigma)).exp();
    (centerline * shape).clamp(0.0, 1.0)
}
