//! Wind-aligned layout geometry and the upstream-to-downstream flow solve.
//!
//! For a wind direction θ (meteorological, the direction the wind comes
//! from) the flow travels along `w = (-sin θ, -cos θ)`. Every turbine gets a
//! downwind coordinate `s = p · w` and a crosswind coordinate
//! `c = p · (cos θ, -sin θ)`:
//!
//! ```text
//!      wind ──►   s increases ──►
//!
//!      T0 ●──────────── x_down ────────────► ● T2
//!                                            ┆ r_cross
//!                                            ● T1
//! ```
//!
//! Pair geometry depends only on the direction, so it is computed once per
//! direction sample and reused for every speed bin. Turbines are processed in
//! ascending `s`; each target only looks at sources that were already
//! solved, which is what lets a source's deficit use its own waked speed.

use super::WakeModel;
use crate::turbine::TurbinePowerModel;
use wflo_core::Point;

/// Relative distance (in rotor diameters) below which two turbines count as
/// coincident, and below which a downstream offset counts as side-by-side.
pub const COINCIDENCE_TOLERANCE: f64 = 1e-9;

/// One upstream source affecting a target turbine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeInteraction {
    pub source: usize,
    /// Downstream distance from source to target, meters
    pub x_down: f64,
    /// Crosswind distance from the source's wake centerline, meters
    pub r_cross: f64,
    /// Source and target share a position; the maximal deficit applies
    pub coincident: bool,
}

/// Processing order and pair geometry for one wind direction
#[derive(Debug, Clone)]
pub struct WakeGeometry {
    /// Turbine indices, upstream first
    order: Vec<usize>,
    /// Per target turbine: sources that can shed a wake onto it
    interactions: Vec<Vec<WakeInteraction>>,
}

impl WakeGeometry {
    /// Rotate the layout into the wind frame and collect all interacting
    /// pairs. `diameter` sets the coincidence scale.
    pub fn new(positions: &[Point], direction_deg: f64, diameter: f64) -> Self {
        let n = positions.len();
        let theta = direction_deg.to_radians();
        let (sin_t, cos_t) = theta.sin_cos();
        let eps = COINCIDENCE_TOLERANCE * diameter;

        let down: Vec<f64> = positions
            .iter()
            .map(|p| -p.x * sin_t - p.y * cos_t)
            .collect();
        let cross: Vec<f64> = positions
            .iter()
            .map(|p| p.x * cos_t - p.y * sin_t)
            .collect();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| down[a].total_cmp(&down[b]).then(a.cmp(&b)));

        // Side-by-side runs (downstream offsets within eps) are ordered by
        // index, so a coincident pair is always solved lower index first.
        let mut start = 0;
        while start < n {
            let mut end = start + 1;
            while end < n && down[order[end]] - down[order[end - 1]] <= eps {
                end += 1;
            }
            order[start..end].sort_unstable();
            start = end;
        }

        let mut interactions = vec![Vec::new(); n];
        for (rank, &t) in order.iter().enumerate() {
            for &s in &order[..rank] {
                let x_down = down[t] - down[s];
                let coincident = positions[s].distance(&positions[t]) < eps;
                if coincident || x_down > eps {
                    interactions[t].push(WakeInteraction {
                        source: s,
                        x_down,
                        r_cross: (cross[t] - cross[s]).abs(),
                        coincident,
                    });
                }
            }
        }

        Self {
            order,
            interactions,
        }
    }

    /// Turbine indices from most upstream to most downstream
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Upstream sources of `target`
    pub fn interactions(&self, target: usize) -> &[WakeInteraction] {
        &self.interactions[target]
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Effective hub-height speed of every turbine at free-stream speed
    /// `u_inf`. `speeds` and `thrust` are scratch buffers reused across
    /// speed bins; `speeds` holds the result.
    pub fn solve_into(
        &self,
        wake: &WakeModel,
        turbine: &TurbinePowerModel,
        u_inf: f64,
        speeds: &mut Vec<f64>,
        thrust: &mut Vec<f64>,
    ) {
        let n = self.order.len();
        let diameter = turbine.diameter();
        speeds.clear();
        speeds.resize(n, u_inf);
        thrust.clear();
        thrust.resize(n, 0.0);

        for &t in &self.order {
            let mut acc = 0.0;
            for inter in &self.interactions[t] {
                let ct = thrust[inter.source];
                let deficit = if inter.coincident {
                    wake.deficit.max_deficit(ct, diameter)
                } else {
                    wake.deficit
                        .deficit(inter.x_down, inter.r_cross, ct, diameter)
                };
                acc = wake.superposition.accumulate(acc, deficit);
            }
            let combined = wake.superposition.finish(acc);
            let u = (u_inf * (1.0 - combined)).max(0.0);
            speeds[t] = u;
            thrust[t] = turbine.thrust_coefficient(u);
        }
    }

    /// Allocating variant of [`Self::solve_into`]
    pub fn solve(&self, wake: &WakeModel, turbine: &TurbinePowerModel, u_inf: f64) -> Vec<f64> {
        let mut speeds = Vec::new();
        let mut thrust = Vec::new();
        self.solve_into(wake, turbine, u_inf, &mut speeds, &mut thrust);
        speeds
    }
}
