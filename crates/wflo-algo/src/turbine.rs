//! Turbine power and thrust curves.
//!
//! A [`TurbinePowerModel`] maps hub-height wind speed to electrical power
//! (kW) and thrust coefficient C_T. Two curve shapes are supported:
//!
//! - [`PowerCurve::Cubic`]: parametric curve of a generic pitch-regulated
//!   turbine. Power rises with v³ from cut-in to rated speed and stays at
//!   rated power until cut-out.
//! - [`PowerCurve::Table`]: manufacturer table with linear interpolation.
//!
//! # Thrust above rated speed
//!
//! For the cubic curve, C_T is constant (`ct_design`) below rated speed.
//! Above rated speed the blades pitch out and the power coefficient drops as
//! `C_P(v) = C_P,design · (v_rated / v)³`. 1-D momentum theory links both
//! coefficients through the axial induction factor `a`:
//!
//! ```text
//! C_P = 4a(1 - a)²        C_T = 4a(1 - a)        a ∈ [0, 1/3]
//! ```
//!
//! `C_P,design` is derived from `ct_design`, so C_T is continuous at rated
//! speed. The induction factor is recovered by bisection.

use serde::{Deserialize, Serialize};
use wflo_core::{Kilowatts, Meters, WfloError, WfloResult};

/// Air density used to derive the rated speed of generic turbines (kg/m³)
pub const AIR_DENSITY: f64 = 1.225;

/// Maximum power coefficient assumed for generic turbines
pub const GENERIC_CP_MAX: f64 = 0.49;

/// Thrust coefficient of generic turbines in partial load
pub const GENERIC_CT_DESIGN: f64 = 0.8;

/// Largest thrust coefficient the wake models accept
pub const MAX_THRUST_COEFFICIENT: f64 = 0.9999;

/// Shape of the power and thrust curves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PowerCurve {
    /// Cubic rise between cut-in and rated speed
    Cubic {
        cut_in: f64,
        rated_speed: f64,
        cut_out: f64,
        ct_design: f64,
        /// Thrust coefficient of a parked rotor (outside the operating range)
        #[serde(default)]
        ct_idle: f64,
    },
    /// Tabulated curve, linearly interpolated; zero outside the table
    Table {
        speeds: Vec<f64>,
        power_kw: Vec<f64>,
        ct: Vec<f64>,
    },
}

/// Immutable description of the (single) turbine type in a layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurbinePowerModel {
    name: String,
    diameter: Meters,
    hub_height: Meters,
    rated_power: Kilowatts,
    curve: PowerCurve,
}

impl TurbinePowerModel {
    /// Validate parameters and build the model.
    pub fn new(
        name: impl Into<String>,
        diameter: Meters,
        hub_height: Meters,
        rated_power: Kilowatts,
        curve: PowerCurve,
    ) -> WfloResult<Self> {
        let name = name.into();
        if !(diameter.is_finite() && diameter.value() > 0.0) {
            return Err(WfloError::input(format!(
                "turbine '{}': rotor diameter must be positive, got {}",
                name, diameter
            )));
        }
        if !(hub_height.is_finite() && hub_height.value() > 0.0) {
            return Err(WfloError::input(format!(
                "turbine '{}': hub height must be positive, got {}",
                name, hub_height
            )));
        }
        if !(rated_power.is_finite() && rated_power.value() > 0.0) {
            return Err(WfloError::input(format!(
                "turbine '{}': rated power must be positive, got {}",
                name, rated_power
            )));
        }
        validate_curve(&name, rated_power.value(), &curve)?;

        Ok(Self {
            name,
            diameter,
            hub_height,
            rated_power,
            curve,
        })
    }

    /// Generic pitch-regulated turbine: cut-in 4 m/s, cut-out 25 m/s and a
    /// rated speed where `½ ρ A C_P,max v³` reaches rated power.
    pub fn generic(
        name: impl Into<String>,
        diameter: Meters,
        hub_height: Meters,
        rated_power: Kilowatts,
    ) -> WfloResult<Self> {
        let rotor_area = std::f64::consts::PI * 0.25 * diameter.value().powi(2);
        let rated_w = rated_power.value() * 1e3;
        let rated_speed = (2.0 * rated_w / (AIR_DENSITY * rotor_area * GENERIC_CP_MAX)).cbrt();

        Self::new(
            name,
            diameter,
            hub_height,
            rated_power,
            PowerCurve::Cubic {
                cut_in: 4.0,
                rated_speed,
                cut_out: 25.0,
                ct_design: GENERIC_CT_DESIGN,
                ct_idle: 0.0,
            },
        )
    }

    /// Siemens Gamesa SG 8.0-167 DD as a generic turbine (D = 167 m,
    /// H = 119 m, 8 MW).
    pub fn sg_8_0_167_dd() -> WfloResult<Self> {
        Self::generic("SG 8.0-167 DD", Meters(167.0), Meters(119.0), Kilowatts(8000.0))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rotor diameter in meters
    pub fn diameter(&self) -> f64 {
        self.diameter.value()
    }

    pub fn hub_height(&self) -> f64 {
        self.hub_height.value()
    }

    pub fn rated_power_kw(&self) -> f64 {
        self.rated_power.value()
    }

    pub fn curve(&self) -> &PowerCurve {
        &self.curve
    }

    /// Electrical power in kW at hub-height speed `v`
    pub fn power(&self, v: f64) -> f64 {
        match &self.curve {
            PowerCurve::Cubic {
                cut_in,
                rated_speed,
                cut_out,
                ..
            } => {
                if !(v >= *cut_in && v <= *cut_out) {
                    0.0
                } else if v >= *rated_speed {
                    self.rated_power.value()
                } else {
                    self.rated_power.value() * (v / rated_speed).powi(3)
                }
            }
            PowerCurve::Table {
                speeds, power_kw, ..
            } => interpolate(speeds, power_kw, v),
        }
    }

    /// Thrust coefficient at hub-height speed `v`, clamped to
    /// `[0, MAX_THRUST_COEFFICIENT]`.
    pub fn thrust_coefficient(&self, v: f64) -> f64 {
        let ct = match &self.curve {
            PowerCurve::Cubic {
                cut_in,
                rated_speed,
                cut_out,
                ct_design,
                ct_idle,
            } => {
                if !(v >= *cut_in && v <= *cut_out) {
                    *ct_idle
                } else if v <= *rated_speed {
                    *ct_design
                } else {
                    let cp = power_coefficient_from_thrust(*ct_design) * (rated_speed / v).powi(3);
                    let a = induction_from_power_coefficient(cp);
                    4.0 * a * (1.0 - a)
                }
            }
            PowerCurve::Table { speeds, ct, .. } => interpolate(speeds, ct, v),
        };
        ct.clamp(0.0, MAX_THRUST_COEFFICIENT)
    }

    /// Power and thrust coefficient in one call
    #[inline]
    pub fn power_and_ct(&self, v: f64) -> (f64, f64) {
        (self.power(v), self.thrust_coefficient(v))
    }
}

fn validate_curve(name: &str, rated_kw: f64, curve: &PowerCurve) -> WfloResult<()> {
    match curve {
        PowerCurve::Cubic {
            cut_in,
            rated_speed,
            cut_out,
            ct_design,
            ct_idle,
        } => {
            let values = [*cut_in, *rated_speed, *cut_out, *ct_design, *ct_idle];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(WfloError::input(format!(
                    "turbine '{}': power curve has non-finite parameters",
                    name
                )));
            }
            if !(*cut_in >= 0.0 && cut_in < rated_speed && rated_speed <= cut_out) {
                return Err(WfloError::input(format!(
                    "turbine '{}': need 0 <= cut-in < rated speed <= cut-out (got {}, {}, {})",
                    name, cut_in, rated_speed, cut_out
                )));
            }
            if !(0.0..1.0).contains(ct_design) || !(0.0..1.0).contains(ct_idle) {
                return Err(WfloError::input(format!(
                    "turbine '{}': thrust coefficients must lie in [0, 1)",
                    name
                )));
            }
        }
        PowerCurve::Table {
            speeds,
            power_kw,
            ct,
        } => {
            if speeds.len() < 2 {
                return Err(WfloError::input(format!(
                    "turbine '{}': power table needs at least 2 points",
                    name
                )));
            }
            if power_kw.len() != speeds.len() || ct.len() != speeds.len() {
                return Err(WfloError::input(format!(
                    "turbine '{}': power table columns differ in length",
                    name
                )));
            }
            if speeds.iter().chain(power_kw).chain(ct).any(|v| !v.is_finite()) {
                return Err(WfloError::input(format!(
                    "turbine '{}': power table has non-finite entries",
                    name
                )));
            }
            if speeds.windows(2).any(|w| w[1] <= w[0]) {
                return Err(WfloError::input(format!(
                    "turbine '{}': power table speeds must be strictly increasing",
                    name
                )));
            }
            if power_kw.iter().any(|&p| p < 0.0) || ct.iter().any(|&c| c < 0.0) {
                return Err(WfloError::input(format!(
                    "turbine '{}': power table has negative entries",
                    name
                )));
            }
            if power_kw.windows(2).any(|w| w[1] < w[0]) {
                return Err(WfloError::input(format!(
                    "turbine '{}': tabulated power must not decrease with speed",
                    name
                )));
            }
            if let Some(&peak) = power_kw.iter().find(|&&p| p > rated_kw) {
                return Err(WfloError::input(format!(
                    "turbine '{}': tabulated power {} kW exceeds rated power {} kW",
                    name, peak, rated_kw
                )));
            }
        }
    }
    Ok(())
}

/// Linear interpolation in a strictly increasing table, zero outside it
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let (first, last) = match (xs.first(), xs.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return 0.0,
    };
    if !(x >= first && x <= last) {
        return 0.0;
    }
    // Index of the first entry strictly greater than x
    let hi = xs.partition_point(|&xi| xi <= x);
    if hi == 0 {
        return ys[0];
    }
    if hi >= xs.len() {
        return ys[xs.len() - 1];
    }
    let lo = hi - 1;
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + t * (ys[hi] - ys[lo])
}

/// Momentum-theory C_P belonging to a thrust coefficient, with the
/// induction factor capped at 1/3.
fn power_coefficient_from_thrust(ct: f64) -> f64 {
    let ct = ct.clamp(0.0, 8.0 / 9.0);
    let a = 0.5 * (1.0 - (1.0 - ct).sqrt());
    4.0 * a * (1.0 - a).powi(2)
}

/// Solve `4a(1 - a)² = cp` for `a ∈ [0, 1/3]` by bisection. The left side is
/// increasing on that interval, reaching 16/27 at a = 1/3.
fn induction_from_power_coefficient(cp: f64) -> f64 {
    let f = |a: f64| 4.0 * a * (1.0 - a).powi(2);
    let (mut lo, mut hi) = (0.0_f64, 1.0 / 3.0);
    if cp <= 0.0 {
        return 0.0;
    }
    if cp >= f(hi) {
        return hi;
    }
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if f(mid) < cp {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> TurbinePowerModel {
        TurbinePowerModel::sg_8_0_167_dd().unwrap()
    }

    fn rated_speed(t: &TurbinePowerModel) -> f64 {
        match t.curve() {
            PowerCurve::Cubic { rated_speed, .. } => *rated_speed,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_generic_rated_speed() {
        let t = reference();
        let vr = rated_speed(&t);
        // ½ ρ A C_P v³ = 8 MW for D = 167 m
        assert!(vr > 10.5 && vr < 10.8, "rated speed {}", vr);
        assert!((t.power(vr) - 8000.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_regions() {
        let t = reference();
        assert_eq!(t.power(0.0), 0.0);
        assert_eq!(t.power(3.99), 0.0);
        assert!(t.power(4.0) > 0.0);
        assert!(t.power(6.0) < t.power(8.0));
        assert_eq!(t.power(15.0), 8000.0);
        assert_eq!(t.power(25.0), 8000.0);
        assert_eq!(t.power(25.01), 0.0);
        assert_eq!(t.power(f64::NAN), 0.0);
    }

    #[test]
    fn test_thrust_continuous_at_rated() {
        let t = reference();
        let vr = rated_speed(&t);
        let below = t.thrust_coefficient(vr - 1e-9);
        let above = t.thrust_coefficient(vr + 1e-6);
        assert!((below - GENERIC_CT_DESIGN).abs() < 1e-12);
        assert!((above - below).abs() < 1e-4, "{} vs {}", above, below);
    }

    #[test]
    fn test_thrust_decreases_above_rated() {
        let t = reference();
        let c12 = t.thrust_coefficient(12.0);
        let c18 = t.thrust_coefficient(18.0);
        let c24 = t.thrust_coefficient(24.0);
        assert!(c12 < GENERIC_CT_DESIGN);
        assert!(c18 < c12);
        assert!(c24 < c18);
        assert!(c24 > 0.0);
        assert_eq!(t.thrust_coefficient(30.0), 0.0);
    }

    #[test]
    fn test_induction_bisection() {
        for &a in &[0.05, 0.1, 0.2, 0.3] {
            let cp = 4.0 * a * (1.0 - a) * (1.0 - a);
            assert!((induction_from_power_coefficient(cp) - a).abs() < 1e-12);
        }
        assert_eq!(induction_from_power_coefficient(-1.0), 0.0);
        assert_eq!(induction_from_power_coefficient(1.0), 1.0 / 3.0);
    }

    #[test]
    fn test_table_interpolation() {
        let t = TurbinePowerModel::new(
            "table",
            Meters(100.0),
            Meters(80.0),
            Kilowatts(2000.0),
            PowerCurve::Table {
                speeds: vec![4.0, 8.0, 12.0, 25.0],
                power_kw: vec![100.0, 900.0, 2000.0, 2000.0],
                ct: vec![0.8, 0.8, 0.5, 0.1],
            },
        )
        .unwrap();

        assert_eq!(t.power(3.0), 0.0);
        assert_eq!(t.power(4.0), 100.0);
        assert!((t.power(6.0) - 500.0).abs() < 1e-12);
        assert_eq!(t.power(25.0), 2000.0);
        assert_eq!(t.power(26.0), 0.0);
        assert!((t.thrust_coefficient(10.0) - 0.65).abs() < 1e-12);
        assert_eq!(t.thrust_coefficient(30.0), 0.0);
    }

    #[test]
    fn test_invalid_turbines_rejected() {
        let generic = |d: f64, h: f64, p: f64| {
            TurbinePowerModel::generic("bad", Meters(d), Meters(h), Kilowatts(p))
        };
        assert!(generic(0.0, 100.0, 1.0).is_err());
        assert!(generic(100.0, -1.0, 1.0).is_err());
        assert!(generic(100.0, 80.0, 0.0).is_err());

        let unsorted = TurbinePowerModel::new(
            "bad",
            Meters(100.0),
            Meters(80.0),
            Kilowatts(1000.0),
            PowerCurve::Table {
                speeds: vec![5.0, 4.0],
                power_kw: vec![0.0, 1.0],
                ct: vec![0.8, 0.8],
            },
        );
        assert!(matches!(unsorted, Err(WfloError::Input(_))));
    }

    #[test]
    fn test_table_bounded_by_rated_power() {
        let table = |power_kw: Vec<f64>| {
            TurbinePowerModel::new(
                "table",
                Meters(100.0),
                Meters(90.0),
                Kilowatts(2000.0),
                PowerCurve::Table {
                    speeds: vec![3.0, 10.0, 25.0],
                    power_kw,
                    ct: vec![0.8, 0.8, 0.2],
                },
            )
        };

        let over_rated = table(vec![0.0, 10000.0, 10000.0]);
        assert!(matches!(over_rated, Err(WfloError::Input(_))));

        let dips = table(vec![0.0, 2000.0, 1500.0]);
        assert!(matches!(dips, Err(WfloError::Input(_))));

        let t = table(vec![0.0, 2000.0, 2000.0]).unwrap();
        for v in [3.0, 7.5, 10.0, 15.0, 25.0] {
            assert!(t.power(v) <= t.rated_power_kw());
        }
    }

    #[test]
    fn test_power_curve_deserializes_tagged() {
        let json = r#"{"type":"cubic","cut_in":3.0,"rated_speed":11.0,"cut_out":25.0,"ct_design":0.8}"#;
        let curve: PowerCurve = serde_json::from_str(json).unwrap();
        assert!(matches!(curve, PowerCurve::Cubic { ct_idle, .. } if ct_idle == 0.0));
    }
}
