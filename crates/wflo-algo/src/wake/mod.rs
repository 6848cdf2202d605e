//! # Wake Deficit Models
//!
//! Turbines extract momentum from the flow and leave a slower, expanding
//! wake behind them. This module computes the effective hub-height speed of
//! every turbine in a layout for one wind direction and free-stream speed.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────┐   ┌──────────────────────┐   ┌───────────────────┐
//! │  WakeGeometry   │──►│ DeficitModel (per    │──►│  Superposition    │
//! │  order + pairs  │   │ source/target pair)  │   │  Σδ, √Σδ², max δ  │
//! └─────────────────┘   └──────────────────────┘   └───────────────────┘
//!                                                             │
//!                                         u_t = U · (1 - δ_t) ◄┘
//! ```
//!
//! 1. [`WakeGeometry`] rotates the layout into the wind frame and sorts
//!    turbines upstream first.
//! 2. For each target, every upstream source contributes
//!    `δ(x_down, r_cross, C_T(u_source))` from the selected
//!    [`DeficitModel`].
//! 3. The [`Superposition`] rule combines the contributions; the result is
//!    clamped to `[0, 1]` and the target's speed is floored at zero.
//!
//! ## Edge Cases
//!
//! - No upstream neighbours: zero deficit.
//! - Coincident turbines: the lower-index turbine imposes the maximal
//!   (`x → 0⁺`, `r = 0`) deficit on the other, never a NaN.
//! - C_T is clamped to `[0, 0.9999]` before any square root.
//!
//! ## References
//!
//! - N.O. Jensen, "A note on wind generator interaction", Risø-M-2411 (1983)
//! - M. Bastankhah, F. Porté-Agel, "A new analytical model for wind-turbine
//!   wakes", Renewable Energy 70 (2014)

pub mod deficit;
pub mod field;
pub mod superposition;

pub use deficit::{DeficitModel, DEFAULT_GAUSSIAN_K, DEFAULT_TOP_HAT_K};
pub use field::{WakeGeometry, WakeInteraction, COINCIDENCE_TOLERANCE};
pub use superposition::Superposition;

use crate::turbine::TurbinePowerModel;
use serde::{Deserialize, Serialize};
use wflo_core::Point;

/// Deficit shape plus superposition rule
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WakeModel {
    pub deficit: DeficitModel,
    pub superposition: Superposition,
}

impl WakeModel {
    pub fn new(deficit: DeficitModel, superposition: Superposition) -> Self {
        Self {
            deficit,
            superposition,
        }
    }

    /// Wake-free model used for free-stream baselines
    pub fn none() -> Self {
        Self::new(DeficitModel::NoWake, Superposition::default())
    }

    pub fn is_wake_free(&self) -> bool {
        matches!(self.deficit, DeficitModel::NoWake)
    }

    /// Effective speeds for a single direction and free-stream speed
    pub fn effective_speeds(
        &self,
        positions: &[Point],
        turbine: &TurbinePowerModel,
        u_inf: f64,
        direction_deg: f64,
    ) -> Vec<f64> {
        WakeGeometry::new(positions, direction_deg, turbine.diameter()).solve(self, turbine, u_inf)
    }
}

impl std::fmt::Display for WakeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.deficit.expansion() {
            Some(k) => write!(
                f,
                "{} (k={}) / {}",
                self.deficit.name(),
                k,
                self.superposition.name()
            ),
            None => write!(f, "{}", self.deficit.name()),
        }
    }
}
