//! Unit newtypes for turbine parameters and energy reports.
//!
//! A rotor diameter, a rated power and an annual yield are all `f64` in the
//! numerical kernels. At API boundaries (turbine construction, AEP reports)
//! they are wrapped so a kW value cannot be passed where meters are expected.
//! All wrappers are `#[repr(transparent)]` over `f64`.
//!
//! ```
//! use wflo_core::units::{GigawattHours, Kilowatts, HOURS_PER_YEAR};
//!
//! let rated = Kilowatts(8000.0);
//! let year = rated.energy_over_hours(HOURS_PER_YEAR);
//! assert!((year.value() - 70.08).abs() < 1e-9);
//! assert_eq!(year, GigawattHours::annual_from_mean_kw(8000.0));
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Hours in a (non-leap) year, the AEP integration horizon
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// kWh per GWh
const KWH_PER_GWH: f64 = 1.0e6;

/// Declare a transparent `f64` quantity with its unit symbol.
macro_rules! quantity {
    ($(#[$meta:meta])* $name:ident, $symbol:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|q| q.0).sum())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", self.0, $symbol)
            }
        }
    };
}

quantity!(
    /// Length in meters (rotor diameter, hub height, planar coordinates)
    Meters,
    "m"
);

quantity!(
    /// Electrical power in kilowatts
    Kilowatts,
    "kW"
);

quantity!(
    /// Energy in gigawatt-hours, the unit AEP is reported in
    GigawattHours,
    "GWh"
);

impl Kilowatts {
    /// Energy delivered at this constant power over `hours`
    #[inline]
    pub fn energy_over_hours(self, hours: f64) -> GigawattHours {
        GigawattHours(self.0 * hours / KWH_PER_GWH)
    }
}

impl GigawattHours {
    /// Annual energy of a probability-weighted mean power in kW.
    #[inline]
    pub fn annual_from_mean_kw(mean_kw: f64) -> Self {
        Kilowatts(mean_kw).energy_over_hours(HOURS_PER_YEAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rated_energy_per_year() {
        // 8 MW for a full year
        let e = Kilowatts(8000.0).energy_over_hours(HOURS_PER_YEAR);
        assert!((e.value() - 70.08).abs() < 1e-9);
        assert_eq!(GigawattHours::annual_from_mean_kw(8000.0), e);
    }

    #[test]
    fn arithmetic_stays_in_unit() {
        let a = Meters(167.0);
        assert_eq!(a * 2.0, Meters(334.0));
        assert_eq!(Meters(334.0) - a, a);
        let total: GigawattHours = [GigawattHours(1.5), GigawattHours(2.5)].into_iter().sum();
        assert_eq!(total, GigawattHours(4.0));
        assert!(!Kilowatts(f64::NAN).is_finite());
    }

    #[test]
    fn display_and_serde() {
        assert_eq!(Meters(334.0).to_string(), "334 m");
        assert_eq!(Kilowatts(-1.5).to_string(), "-1.5 kW");
        assert_eq!(serde_json::to_string(&Kilowatts(8000.0)).unwrap(), "8000.0");
        let d: Meters = serde_json::from_str("167.0").unwrap();
        assert_eq!(d, Meters(167.0));
    }
}
