//! Annual Energy Production (AEP) evaluation.
//!
//! AEP integrates turbine power over the site climate:
//!
//! ```text
//! AEP = 8760 h · Σ_dir Σ_v Σ_t  P(u_t(dir, v)) · w_dir · p_sector(dir)(v)
//! ```
//!
//! where `w_dir` is the probability weight of the direction sample (sector
//! frequency split across the sector's samples), `p_sector(v)` the Weibull
//! mass of speed bin `v` in that sector and `u_t` the waked speed of turbine
//! `t`. Results are reported in GWh/year.
//!
//! # Determinism
//!
//! Direction samples are evaluated in parallel with rayon. Each sample
//! produces its own per-turbine vector and the vectors are reduced
//! sequentially in sample order, so repeated evaluations of the same layout
//! are bit-for-bit identical regardless of thread count.

use crate::resource::{DirectionSample, SpeedBins, WindResource};
use crate::turbine::TurbinePowerModel;
use crate::wake::{WakeGeometry, WakeModel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wflo_core::{GigawattHours, Layout, Point, WfloError, WfloResult, HOURS_PER_YEAR};

/// Quadrature settings for the AEP integral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AepConfig {
    pub speed_bins: SpeedBins,
    /// Direction samples per sector (1 = sector centers only)
    pub directions_per_sector: usize,
}

impl Default for AepConfig {
    fn default() -> Self {
        Self {
            speed_bins: SpeedBins::default(),
            directions_per_sector: 1,
        }
    }
}

/// AEP of one layout, broken down per turbine and per sector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AepReport {
    /// Farm AEP, GWh/year
    pub total_gwh: f64,
    /// AEP of each turbine, in layout order
    pub per_turbine_gwh: Vec<f64>,
    /// AEP contributed by each wind rose sector
    pub per_sector_gwh: Vec<f64>,
    /// AEP the same turbines would produce without wake losses
    pub free_stream_gwh: f64,
    /// Upper bound: every turbine at rated power all year
    pub rated_gwh: f64,
}

impl AepReport {
    pub fn total(&self) -> GigawattHours {
        GigawattHours(self.total_gwh)
    }

    pub fn num_turbines(&self) -> usize {
        self.per_turbine_gwh.len()
    }

    /// Share of free-stream energy lost to wakes, percent
    pub fn wake_loss_percent(&self) -> f64 {
        if self.free_stream_gwh > 0.0 {
            100.0 * (1.0 - self.total_gwh / self.free_stream_gwh)
        } else {
            0.0
        }
    }

    /// AEP relative to running at rated power all year
    pub fn capacity_factor(&self) -> f64 {
        if self.rated_gwh > 0.0 {
            self.total_gwh / self.rated_gwh
        } else {
            0.0
        }
    }
}

/// Evaluates the AEP of layouts for one site, turbine and wake model
#[derive(Debug, Clone)]
pub struct AepEvaluator {
    resource: WindResource,
    turbine: TurbinePowerModel,
    wake: WakeModel,
    config: AepConfig,
    samples: Vec<DirectionSample>,
    speeds: Vec<f64>,
    /// Weibull bin masses, one row per sector
    bin_probabilities: Vec<Vec<f64>>,
    /// Probability-weighted power of a single unwaked turbine, kW
    isolated_mean_kw: f64,
}

impl AepEvaluator {
    pub fn new(
        resource: WindResource,
        turbine: TurbinePowerModel,
        wake: WakeModel,
        config: AepConfig,
    ) -> WfloResult<Self> {
        config.speed_bins.validate()?;
        if config.directions_per_sector == 0 {
            return Err(WfloError::input("directions_per_sector must be at least 1"));
        }
        if let Some(k) = wake.deficit.expansion() {
            if !(k.is_finite() && k >= 0.0) {
                return Err(WfloError::input(format!(
                    "wake expansion coefficient must be non-negative, got {}",
                    k
                )));
            }
        }

        let samples = resource.direction_samples(config.directions_per_sector);
        let speeds = config.speed_bins.centers();
        let bin_probabilities: Vec<Vec<f64>> = resource
            .sectors()
            .iter()
            .map(|s| config.speed_bins.probabilities(s.weibull_a, s.weibull_k))
            .collect();

        let isolated_mean_kw = samples
            .iter()
            .map(|sample| {
                let probs = &bin_probabilities[sample.sector];
                let kw: f64 = speeds
                    .iter()
                    .zip(probs)
                    .map(|(&v, &p)| p * turbine.power(v))
                    .sum();
                sample.weight * kw
            })
            .sum();

        Ok(Self {
            resource,
            turbine,
            wake,
            config,
            samples,
            speeds,
            bin_probabilities,
            isolated_mean_kw,
        })
    }

    pub fn resource(&self) -> &WindResource {
        &self.resource
    }

    pub fn turbine(&self) -> &TurbinePowerModel {
        &self.turbine
    }

    pub fn wake_model(&self) -> &WakeModel {
        &self.wake
    }

    pub fn config(&self) -> &AepConfig {
        &self.config
    }

    /// AEP of a single turbine without any neighbours, GWh/year
    pub fn isolated_turbine_gwh(&self) -> f64 {
        GigawattHours::annual_from_mean_kw(self.isolated_mean_kw).value()
    }

    /// `n_turbines` at rated power for a full year, GWh
    pub fn rated_gwh(&self, n_turbines: usize) -> f64 {
        GigawattHours::annual_from_mean_kw(n_turbines as f64 * self.turbine.rated_power_kw())
            .value()
    }

    /// Wake-aware AEP of `layout`
    pub fn evaluate(&self, layout: &Layout) -> WfloResult<AepReport> {
        layout.validate()?;
        self.evaluate_positions(layout.positions(), &self.wake)
    }

    /// AEP of `layout` with all wake interactions switched off
    pub fn evaluate_free_stream(&self, layout: &Layout) -> WfloResult<AepReport> {
        layout.validate()?;
        self.evaluate_positions(layout.positions(), &WakeModel::none())
    }

    /// Optimizer objective: negative total AEP (GWh) of a flat
    /// `[x.., y..]` design vector.
    pub fn objective(&self, x_flat: &[f64]) -> WfloResult<f64> {
        let layout = Layout::from_flat(x_flat)?;
        Ok(-self.evaluate(&layout)?.total_gwh)
    }

    fn evaluate_positions(&self, positions: &[Point], wake: &WakeModel) -> WfloResult<AepReport> {
        let n = positions.len();
        let diameter = self.turbine.diameter();

        // Per direction sample: probability-weighted mean power per turbine (kW)
        let per_sample: Vec<Vec<f64>> = self
            .samples
            .par_iter()
            .map(|sample| {
                let geometry = WakeGeometry::new(positions, sample.direction_deg, diameter);
                let probs = &self.bin_probabilities[sample.sector];
                let mut mean_kw = vec![0.0; n];
                let mut speeds = Vec::with_capacity(n);
                let mut thrust = Vec::with_capacity(n);

                for (&u_inf, &p) in self.speeds.iter().zip(probs) {
                    if p == 0.0 {
                        continue;
                    }
                    geometry.solve_into(wake, &self.turbine, u_inf, &mut speeds, &mut thrust);
                    for (acc, &u) in mean_kw.iter_mut().zip(&speeds) {
                        *acc += p * self.turbine.power(u);
                    }
                }

                for acc in &mut mean_kw {
                    *acc *= sample.weight;
                }
                mean_kw
            })
            .collect();

        // Fixed-order reduction
        let mut per_turbine_kw = vec![0.0; n];
        let mut per_sector_kw = vec![0.0; self.resource.num_sectors()];
        for (sample, mean_kw) in self.samples.iter().zip(&per_sample) {
            let mut sample_total = 0.0;
            for (acc, &kw) in per_turbine_kw.iter_mut().zip(mean_kw) {
                *acc += kw;
                sample_total += kw;
            }
            per_sector_kw[sample.sector] += sample_total;
        }

        let to_gwh = |kw: f64| kw * HOURS_PER_YEAR / 1e6;
        let per_turbine_gwh: Vec<f64> = per_turbine_kw.into_iter().map(to_gwh).collect();
        let per_sector_gwh: Vec<f64> = per_sector_kw.into_iter().map(to_gwh).collect();
        let total_gwh: f64 = per_turbine_gwh.iter().sum();

        if !total_gwh.is_finite() {
            return Err(WfloError::numerical(format!(
                "AEP evaluation produced a non-finite total ({})",
                total_gwh
            )));
        }

        Ok(AepReport {
            total_gwh,
            per_turbine_gwh,
            per_sector_gwh,
            free_stream_gwh: n as f64 * self.isolated_turbine_gwh(),
            rated_gwh: self.rated_gwh(n),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wake::{DeficitModel, Superposition};

    fn evaluator(wake: WakeModel) -> AepEvaluator {
        AepEvaluator::new(
            WindResource::uniform(12, 9.0, 2.0).unwrap(),
            TurbinePowerModel::sg_8_0_167_dd().unwrap(),
            wake,
            AepConfig::default(),
        )
        .unwrap()
    }

    fn row(n: usize, spacing: f64) -> Layout {
        (0..n)
            .map(|i| Point::new(i as f64 * spacing, 0.0))
            .collect()
    }

    #[test]
    fn test_single_turbine_matches_isolated() {
        let eval = evaluator(WakeModel::default());
        let report = eval.evaluate(&row(1, 0.0)).unwrap();
        assert!((report.total_gwh - eval.isolated_turbine_gwh()).abs() < 1e-9);
        assert!(report.wake_loss_percent().abs() < 1e-9);
        // Plausible offshore-ish capacity factor for A=9, k=2
        let cf = report.capacity_factor();
        assert!(cf > 0.3 && cf < 0.7, "capacity factor {}", cf);
    }

    #[test]
    fn test_breakdowns_sum_to_total() {
        let eval = evaluator(WakeModel::default());
        let report = eval.evaluate(&row(4, 400.0)).unwrap();
        let by_turbine: f64 = report.per_turbine_gwh.iter().sum();
        let by_sector: f64 = report.per_sector_gwh.iter().sum();
        assert_eq!(report.per_sector_gwh.len(), 12);
        assert!((by_turbine - report.total_gwh).abs() < 1e-9);
        assert!((by_sector - report.total_gwh).abs() < 1e-9);
    }

    #[test]
    fn test_free_stream_report() {
        let eval = evaluator(WakeModel::new(DeficitModel::top_hat(), Superposition::LinearSum));
        let layout = row(3, 334.0);
        let waked = eval.evaluate(&layout).unwrap();
        let free = eval.evaluate_free_stream(&layout).unwrap();
        assert!(waked.total_gwh < free.total_gwh);
        assert!((free.total_gwh - waked.free_stream_gwh).abs() < 1e-9);
        assert!(waked.wake_loss_percent() > 0.0);
    }

    #[test]
    fn test_objective_is_negative_aep() {
        let eval = evaluator(WakeModel::default());
        let layout = row(2, 600.0);
        let aep = eval.evaluate(&layout).unwrap().total_gwh;
        assert_eq!(eval.objective(&layout.to_flat()).unwrap(), -aep);
    }

    #[test]
    fn test_invalid_layouts_rejected() {
        let eval = evaluator(WakeModel::default());
        assert!(matches!(eval.evaluate(&Layout::default()), Err(WfloError::Input(_))));
        let nan = Layout::new(vec![Point::new(f64::NAN, 0.0)]);
        assert!(matches!(eval.evaluate(&nan), Err(WfloError::Input(_))));
        assert!(eval.objective(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let build = |config: AepConfig, wake: WakeModel| {
            AepEvaluator::new(
                WindResource::uniform(4, 9.0, 2.0).unwrap(),
                TurbinePowerModel::sg_8_0_167_dd().unwrap(),
                wake,
                config,
            )
        };
        let zero_dirs = AepConfig {
            directions_per_sector: 0,
            ..AepConfig::default()
        };
        assert!(build(zero_dirs, WakeModel::default()).is_err());

        let negative_k = WakeModel::new(DeficitModel::Gaussian { k: -0.1 }, Superposition::Max);
        assert!(build(AepConfig::default(), negative_k).is_err());
    }
}
