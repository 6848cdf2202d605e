//! Sector-wise Weibull wind resource.
//!
//! The site climate is a wind rose of K directional sectors. Each sector
//! carries the probability that the wind blows from it and a Weibull speed
//! distribution:
//!
//! ```text
//! f_i(v) = freq_i · (k_i / A_i) · (v / A_i)^(k_i - 1) · exp(-(v / A_i)^k_i)
//! ```
//!
//! Sector `i` covers `[center_i - 180/K, center_i + 180/K)` degrees, using
//! the meteorological convention (direction the wind comes **from**,
//! clockwise from north).
//!
//! # Quadrature
//!
//! AEP integration discretizes speed into [`SpeedBins`] and each sector into
//! evenly spread direction samples. Bin probabilities are the exact Weibull
//! mass between the bin edges, so nothing depends on evaluating the density
//! at a single point:
//!
//! ```text
//! P(bin v) = F(v + Δ/2) - F(max(v - Δ/2, 0)),    F(v) = 1 - exp(-(v/A)^k)
//! ```

use serde::{Deserialize, Serialize};
use wflo_core::{WfloError, WfloResult};

/// Slack allowed when checking that sector centers tile the compass (degrees)
const DIRECTION_TOLERANCE_DEG: f64 = 1e-6;

/// One directional sector of the wind rose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    /// Sector center, degrees clockwise from north
    pub direction_deg: f64,
    /// Occurrence weight; normalized across sectors at construction
    pub frequency: f64,
    /// Weibull scale parameter A (m/s)
    pub weibull_a: f64,
    /// Weibull shape parameter k
    pub weibull_k: f64,
}

impl Sector {
    pub fn new(direction_deg: f64, frequency: f64, weibull_a: f64, weibull_k: f64) -> Self {
        Self {
            direction_deg,
            frequency,
            weibull_a,
            weibull_k,
        }
    }
}

/// Weibull probability density, zero for negative speeds
pub fn weibull_pdf(v: f64, a: f64, k: f64) -> f64 {
    if v < 0.0 {
        return 0.0;
    }
    let r = v / a;
    (k / a) * r.powf(k - 1.0) * (-r.powf(k)).exp()
}

/// Weibull cumulative distribution, zero for negative speeds
pub fn weibull_cdf(v: f64, a: f64, k: f64) -> f64 {
    if v <= 0.0 {
        return 0.0;
    }
    1.0 - (-(v / a).powf(k)).exp()
}

/// Uniform wind speed grid used for AEP quadrature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedBins {
    /// First bin center (m/s)
    pub min: f64,
    /// Last bin center (m/s)
    pub max: f64,
    /// Bin width (m/s)
    pub step: f64,
}

impl Default for SpeedBins {
    fn default() -> Self {
        Self {
            min: 3.0,
            max: 25.0,
            step: 1.0,
        }
    }
}

impl SpeedBins {
    pub fn new(min: f64, max: f64, step: f64) -> WfloResult<Self> {
        let bins = Self { min, max, step };
        bins.validate()?;
        Ok(bins)
    }

    pub fn validate(&self) -> WfloResult<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.step.is_finite()) {
            return Err(WfloError::input("speed bins must be finite"));
        }
        if self.min < 0.0 || self.max < self.min || self.step <= 0.0 {
            return Err(WfloError::input(format!(
                "invalid speed bins: min {} max {} step {}",
                self.min, self.max, self.step
            )));
        }
        Ok(())
    }

    /// Bin centers from `min` to `max` inclusive
    pub fn centers(&self) -> Vec<f64> {
        // Half-step slack absorbs rounding in (max - min) / step
        let n = ((self.max - self.min) / self.step + 0.5).floor() as usize + 1;
        (0..n).map(|i| self.min + i as f64 * self.step).collect()
    }

    /// Weibull mass of each bin for one sector
    pub fn probabilities(&self, a: f64, k: f64) -> Vec<f64> {
        let half = 0.5 * self.step;
        self.centers()
            .into_iter()
            .map(|v| weibull_cdf(v + half, a, k) - weibull_cdf((v - half).max(0.0), a, k))
            .collect()
    }
}

/// A single wind direction used in the AEP quadrature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionSample {
    /// Index of the sector the sample belongs to
    pub sector: usize,
    /// Direction, degrees clockwise from north
    pub direction_deg: f64,
    /// Probability weight (sector frequency split across its samples)
    pub weight: f64,
}

/// Immutable wind rose with normalized sector frequencies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindResource {
    sectors: Vec<Sector>,
    /// Ambient turbulence intensity, carried as site metadata
    turbulence_intensity: Option<f64>,
}

impl WindResource {
    /// Validate sectors and normalize their frequencies to sum to one.
    pub fn new(sectors: Vec<Sector>) -> WfloResult<Self> {
        if sectors.is_empty() {
            return Err(WfloError::input("wind resource needs at least one sector"));
        }

        for (i, s) in sectors.iter().enumerate() {
            if !(s.direction_deg.is_finite()
                && s.frequency.is_finite()
                && s.weibull_a.is_finite()
                && s.weibull_k.is_finite())
            {
                return Err(WfloError::input(format!("sector {} has a non-finite value", i)));
            }
            if s.frequency < 0.0 {
                return Err(WfloError::input(format!(
                    "sector {} has negative frequency {}",
                    i, s.frequency
                )));
            }
            if s.weibull_a <= 0.0 || s.weibull_k <= 0.0 {
                return Err(WfloError::input(format!(
                    "sector {} needs Weibull A > 0 and k > 0 (got A={}, k={})",
                    i, s.weibull_a, s.weibull_k
                )));
            }
        }

        let total: f64 = sectors.iter().map(|s| s.frequency).sum();
        if total <= 0.0 {
            return Err(WfloError::input("sector frequencies sum to zero"));
        }

        let sectors: Vec<Sector> = sectors
            .into_iter()
            .map(|s| Sector {
                direction_deg: s.direction_deg.rem_euclid(360.0),
                frequency: s.frequency / total,
                ..s
            })
            .collect();
        check_partition(&sectors)?;

        Ok(Self {
            sectors,
            turbulence_intensity: None,
        })
    }

    /// `n_sectors` equal-frequency sectors centered at `i · 360 / n_sectors`,
    /// all sharing one Weibull distribution.
    pub fn uniform(n_sectors: usize, a: f64, k: f64) -> WfloResult<Self> {
        if n_sectors == 0 {
            return Err(WfloError::input("wind resource needs at least one sector"));
        }
        let width = 360.0 / n_sectors as f64;
        Self::new(
            (0..n_sectors)
                .map(|i| Sector::new(i as f64 * width, 1.0, a, k))
                .collect(),
        )
    }

    /// All wind from a single direction
    pub fn single_direction(direction_deg: f64, a: f64, k: f64) -> WfloResult<Self> {
        Self::new(vec![Sector::new(direction_deg, 1.0, a, k)])
    }

    pub fn with_turbulence_intensity(mut self, ti: f64) -> Self {
        self.turbulence_intensity = Some(ti);
        self
    }

    pub fn turbulence_intensity(&self) -> Option<f64> {
        self.turbulence_intensity
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn num_sectors(&self) -> usize {
        self.sectors.len()
    }

    /// Angular width of every sector, degrees
    pub fn sector_width_deg(&self) -> f64 {
        360.0 / self.sectors.len() as f64
    }

    /// Frequency-weighted Weibull density of `sector` at speed `v`.
    ///
    /// Negative speeds and unknown sectors return 0.
    pub fn sector_probability_density(&self, sector: usize, v: f64) -> f64 {
        match self.sectors.get(sector) {
            Some(s) => s.frequency * weibull_pdf(v, s.weibull_a, s.weibull_k),
            None => 0.0,
        }
    }

    /// Sector whose half-open interval contains `direction_deg`
    pub fn sector_of(&self, direction_deg: f64) -> usize {
        let width = self.sector_width_deg();
        let half = 0.5 * width;
        self.sectors
            .iter()
            .position(|s| {
                let offset = (direction_deg - s.direction_deg + half).rem_euclid(360.0);
                offset < width
            })
            .unwrap_or(0)
    }

    /// Direction samples spread evenly inside every sector.
    ///
    /// With one sample per sector the sample sits on the sector center.
    pub fn direction_samples(&self, per_sector: usize) -> Vec<DirectionSample> {
        let per_sector = per_sector.max(1);
        let width = self.sector_width_deg();
        let sub = width / per_sector as f64;

        self.sectors
            .iter()
            .enumerate()
            .flat_map(|(i, s)| {
                (0..per_sector).map(move |j| DirectionSample {
                    sector: i,
                    direction_deg: (s.direction_deg - 0.5 * width + (j as f64 + 0.5) * sub)
                        .rem_euclid(360.0),
                    weight: s.frequency / per_sector as f64,
                })
            })
            .collect()
    }
}

/// Sorted sector centers must sit exactly `360 / K` apart, so the half-open
/// sector intervals tile the compass without gaps or overlap.
fn check_partition(sectors: &[Sector]) -> WfloResult<()> {
    let width = 360.0 / sectors.len() as f64;
    let mut centers: Vec<f64> = sectors.iter().map(|s| s.direction_deg).collect();
    centers.sort_by(f64::total_cmp);

    let wrap = centers.first().map(|first| first + 360.0);
    let next = centers.iter().skip(1).copied().chain(wrap);
    for (i, (&from, to)) in centers.iter().zip(next).enumerate() {
        let gap = to - from;
        if (gap - width).abs() > DIRECTION_TOLERANCE_DEG {
            return Err(WfloError::input(format!(
                "sector centers must be evenly spaced {:.3} deg apart to cover 360 deg \
                 (gap of {:.3} deg after {:.3} deg, sorted position {})",
                width, gap, from, i
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequencies_normalized() {
        let wr = WindResource::new(vec![
            Sector::new(0.0, 2.0, 9.0, 2.0),
            Sector::new(180.0, 6.0, 9.0, 2.0),
        ])
        .unwrap();
        assert!((wr.sectors()[0].frequency - 0.25).abs() < 1e-15);
        assert!((wr.sectors()[1].frequency - 0.75).abs() < 1e-15);
    }

    #[test]
    fn test_invalid_resources_rejected() {
        assert!(WindResource::new(vec![]).is_err());
        assert!(WindResource::new(vec![Sector::new(0.0, 0.0, 9.0, 2.0)]).is_err());
        assert!(WindResource::new(vec![Sector::new(0.0, 1.0, -1.0, 2.0)]).is_err());
        assert!(WindResource::new(vec![Sector::new(0.0, 1.0, 9.0, 0.0)]).is_err());
        assert!(WindResource::uniform(0, 9.0, 2.0).is_err());
    }

    #[test]
    fn test_uneven_or_duplicate_sectors_rejected() {
        let uneven = WindResource::new(vec![
            Sector::new(0.0, 1.0, 9.0, 2.0),
            Sector::new(10.0, 1.0, 9.0, 2.0),
        ]);
        assert!(uneven.is_err());

        let duplicate = WindResource::new(vec![
            Sector::new(90.0, 1.0, 9.0, 2.0),
            Sector::new(90.0, 1.0, 9.0, 2.0),
        ]);
        assert!(duplicate.is_err());

        let skipped = WindResource::new(
            [0.0, 90.0, 180.0, 180.0]
                .into_iter()
                .map(|d| Sector::new(d, 1.0, 9.0, 2.0))
                .collect(),
        );
        assert!(skipped.is_err());
    }

    #[test]
    fn test_shuffled_even_sectors_tile_compass() {
        // Input order is kept; only the sorted centers need even spacing.
        // -90 wraps to 270.
        let wr = WindResource::new(
            [180.0, 0.0, -90.0, 90.0]
                .into_iter()
                .map(|d| Sector::new(d, 1.0, 9.0, 2.0))
                .collect(),
        )
        .unwrap();
        assert_eq!(wr.sectors()[2].direction_deg, 270.0);
        assert_eq!(wr.sector_of(190.0), 0);
        assert_eq!(wr.sector_of(10.0), 1);
        assert_eq!(wr.sector_of(300.0), 2);

        let mut covered: Vec<f64> = wr
            .direction_samples(2)
            .iter()
            .map(|s| s.direction_deg)
            .collect();
        covered.sort_by(f64::total_cmp);
        assert_eq!(covered, vec![22.5, 67.5, 112.5, 157.5, 202.5, 247.5, 292.5, 337.5]);
        for sample in wr.direction_samples(2) {
            assert_eq!(wr.sector_of(sample.direction_deg), sample.sector);
        }
    }

    #[test]
    fn test_density_matches_weibull() {
        let wr = WindResource::uniform(12, 9.0, 2.0).unwrap();
        let v = 9.0;
        // k=2, v=A: (2/9) * 1 * e^-1, split over 12 sectors
        let expected = (2.0 / 9.0) * (-1.0f64).exp() / 12.0;
        assert!((wr.sector_probability_density(3, v) - expected).abs() < 1e-15);
        assert_eq!(wr.sector_probability_density(3, -1.0), 0.0);
        assert_eq!(wr.sector_probability_density(99, 5.0), 0.0);
    }

    #[test]
    fn test_cdf_bounds() {
        assert_eq!(weibull_cdf(-3.0, 9.0, 2.0), 0.0);
        assert_eq!(weibull_cdf(0.0, 9.0, 2.0), 0.0);
        assert!((weibull_cdf(9.0, 9.0, 2.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-15);
        assert!(weibull_cdf(1e3, 9.0, 2.0) > 1.0 - 1e-12);
    }

    #[test]
    fn test_speed_bins_default_grid() {
        let bins = SpeedBins::default();
        let centers = bins.centers();
        assert_eq!(centers.len(), 23);
        assert_eq!(centers[0], 3.0);
        assert_eq!(centers[22], 25.0);

        let probs = bins.probabilities(9.0, 2.0);
        let mass: f64 = probs.iter().sum();
        // Mass between 2.5 and 25.5 m/s
        let expected = weibull_cdf(25.5, 9.0, 2.0) - weibull_cdf(2.5, 9.0, 2.0);
        assert!((mass - expected).abs() < 1e-12);
        assert!(probs.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn test_speed_bins_validation() {
        assert!(SpeedBins::new(3.0, 25.0, 0.0).is_err());
        assert!(SpeedBins::new(10.0, 5.0, 1.0).is_err());
        assert!(SpeedBins::new(-1.0, 5.0, 1.0).is_err());
        assert!(SpeedBins::new(0.0, 30.0, 0.5).is_ok());
    }

    #[test]
    fn test_sector_intervals() {
        let wr = WindResource::uniform(12, 9.0, 2.0).unwrap();
        assert_eq!(wr.sector_of(0.0), 0);
        assert_eq!(wr.sector_of(14.9), 0);
        assert_eq!(wr.sector_of(15.0), 1);
        assert_eq!(wr.sector_of(-15.0), 0);
        assert_eq!(wr.sector_of(345.0), 0);
        assert_eq!(wr.sector_of(270.0), 9);
    }

    #[test]
    fn test_direction_samples() {
        let wr = WindResource::uniform(4, 9.0, 2.0).unwrap();

        let centers = wr.direction_samples(1);
        assert_eq!(centers.len(), 4);
        assert_eq!(centers[1].direction_deg, 90.0);

        let samples = wr.direction_samples(3);
        assert_eq!(samples.len(), 12);
        // Sector 0 spans [-45, 45): samples at -30, 0, 30
        assert!((samples[0].direction_deg - 330.0).abs() < 1e-12);
        assert!((samples[1].direction_deg - 0.0).abs() < 1e-12);
        assert!((samples[2].direction_deg - 30.0).abs() < 1e-12);

        let total: f64 = samples.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(samples.iter().all(|s| wr.sector_of(s.direction_deg) == s.sector));
    }
}
