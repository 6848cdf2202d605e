//! Problem file: everything a layout run needs, in one TOML or JSON document.
//!
//! ```toml
//! [turbine]
//! preset = "sg-8.0-167-dd"
//!
//! [site]
//! n_sectors = 12
//! weibull_a = 9.0
//! weibull_k = 2.0
//! turbulence_intensity = 0.07
//!
//! [wake]
//! model = "gaussian"
//! superposition = "squared-sum"
//!
//! [optimizer]
//! algorithm = "sqp"
//! max_iterations = 20
//!
//! [layout]
//! min_spacing = 334.0
//! boundary = [[0.0, 0.0], [4000.0, 0.0], [4000.0, 3000.0], [0.0, 3000.0]]
//! turbines = [[500.0, 500.0], [1500.0, 500.0]]
//! ```
//!
//! Files ending in `.json` are parsed as JSON with the same structure; any
//! other extension is parsed as TOML. Every knob except the turbines has a
//! default.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use wflo_algo::optimizer::LayoutProblemBuilder;
use wflo_algo::{
    AepConfig, AepEvaluator, DeficitModel, LayoutProblem, OptimizerConfig, PowerCurve, Sector,
    Superposition, TurbinePowerModel, WakeModel, WindResource,
};
use wflo_core::{BoundaryPolygon, Kilowatts, Layout, Meters, Point, WfloError};

use crate::cli::WakeKind;

/// Name of the built-in Siemens Gamesa SG 8.0-167 DD turbine
pub const SG_8_0_167_DD: &str = "sg-8.0-167-dd";

// ============================================================================
// File Sections
// ============================================================================

/// Parsed problem file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProblemFile {
    pub turbine: TurbineSection,
    pub site: SiteSection,
    pub wake: WakeSection,
    pub aep: AepConfig,
    pub optimizer: OptimizerConfig,
    pub layout: LayoutSection,
}

/// `[turbine]`: a preset, or explicit parameters with an optional curve
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TurbineSection {
    pub preset: Option<String>,
    pub name: Option<String>,
    pub diameter: Option<f64>,
    pub hub_height: Option<f64>,
    pub rated_power_kw: Option<f64>,
    /// Power/thrust curve; a generic cubic curve is derived when absent
    pub curve: Option<PowerCurve>,
}

/// `[site]`: either uniform sectors sharing one Weibull distribution, or an
/// explicit `[[site.sectors]]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    pub n_sectors: usize,
    pub weibull_a: f64,
    pub weibull_k: f64,
    pub turbulence_intensity: Option<f64>,
    pub sectors: Vec<Sector>,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            n_sectors: 12,
            weibull_a: 9.0,
            weibull_k: 2.0,
            turbulence_intensity: None,
            sectors: Vec::new(),
        }
    }
}

/// `[wake]`: deficit shape, optional expansion coefficient, superposition
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WakeSection {
    pub model: WakeKind,
    /// Expansion coefficient; 0.04 (Gaussian) or 0.1 (top-hat) when unset
    pub k: Option<f64>,
    pub superposition: Superposition,
}

/// `[layout]`: seed positions, site boundary and spacing, planar meters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutSection {
    pub turbines: Vec<[f64; 2]>,
    pub boundary: Vec<[f64; 2]>,
    /// Minimum spacing in meters; takes precedence over `min_spacing_diameters`
    pub min_spacing: Option<f64>,
    pub min_spacing_diameters: Option<f64>,
}

fn to_points(pairs: &[[f64; 2]]) -> Vec<Point> {
    pairs.iter().map(|&[x, y]| Point::new(x, y)).collect()
}

// ============================================================================
// Loading
// ============================================================================

impl ProblemFile {
    /// Read a problem file, choosing the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(WfloError::from)
            .with_context(|| format!("reading problem file {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        };
        parsed.with_context(|| format!("parsing problem file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| WfloError::Parse(e.to_string()).into())
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text).map_err(WfloError::from)?)
    }

    // ========================================================================
    // Domain Objects
    // ========================================================================

    pub fn turbine_model(&self) -> Result<TurbinePowerModel> {
        let t = &self.turbine;
        if let Some(preset) = &t.preset {
            if preset.eq_ignore_ascii_case(SG_8_0_167_DD) {
                return Ok(TurbinePowerModel::sg_8_0_167_dd()?);
            }
            bail!(
                "unknown turbine preset '{}' (available: {})",
                preset,
                SG_8_0_167_DD
            );
        }

        let (Some(diameter), Some(hub_height), Some(rated)) =
            (t.diameter, t.hub_height, t.rated_power_kw)
        else {
            bail!("[turbine] needs a preset or diameter, hub_height and rated_power_kw");
        };
        let name = t.name.clone().unwrap_or_else(|| "custom".to_string());
        let model = match &t.curve {
            Some(curve) => TurbinePowerModel::new(
                name,
                Meters(diameter),
                Meters(hub_height),
                Kilowatts(rated),
                curve.clone(),
            )?,
            None => TurbinePowerModel::generic(
                name,
                Meters(diameter),
                Meters(hub_height),
                Kilowatts(rated),
            )?,
        };
        Ok(model)
    }

    pub fn wind_resource(&self) -> Result<WindResource> {
        let s = &self.site;
        let resource = if s.sectors.is_empty() {
            WindResource::uniform(s.n_sectors, s.weibull_a, s.weibull_k)?
        } else {
            WindResource::new(s.sectors.clone())?
        };
        Ok(match s.turbulence_intensity {
            Some(ti) => resource.with_turbulence_intensity(ti),
            None => resource,
        })
    }

    /// Wake model of the file, or of `override_kind` when given.
    pub fn wake_model(&self, override_kind: Option<WakeKind>) -> WakeModel {
        let kind = override_kind.unwrap_or(self.wake.model);
        // a k tuned for one shape does not carry over to another
        let k = if override_kind.is_some_and(|o| o != self.wake.model) {
            None
        } else {
            self.wake.k
        };
        let deficit = match kind {
            WakeKind::Gaussian => {
                k.map_or_else(DeficitModel::gaussian, |k| DeficitModel::Gaussian { k })
            }
            WakeKind::TopHat => k.map_or_else(DeficitModel::top_hat, |k| DeficitModel::TopHat { k }),
            WakeKind::None => DeficitModel::NoWake,
        };
        WakeModel::new(deficit, self.wake.superposition)
    }

    pub fn seed_layout(&self) -> Result<Layout> {
        if self.layout.turbines.is_empty() {
            bail!("[layout] lists no turbines");
        }
        let layout = Layout::new(to_points(&self.layout.turbines));
        layout.validate()?;
        Ok(layout)
    }

    pub fn boundary(&self) -> Result<BoundaryPolygon> {
        if self.layout.boundary.is_empty() {
            bail!("[layout] has no boundary polygon");
        }
        Ok(BoundaryPolygon::new(to_points(&self.layout.boundary))?)
    }

    /// AEP evaluator for the seed layout; no boundary is needed.
    pub fn evaluator(&self, override_kind: Option<WakeKind>) -> Result<AepEvaluator> {
        Ok(AepEvaluator::new(
            self.wind_resource()?,
            self.turbine_model()?,
            self.wake_model(override_kind),
            self.aep,
        )?)
    }

    pub fn problem_builder(&self) -> Result<LayoutProblemBuilder> {
        let mut builder = LayoutProblemBuilder::new(self.turbine_model()?, self.wind_resource()?)
            .wake_model(self.wake_model(None))
            .aep_config(self.aep)
            .boundary(self.boundary()?)
            .seed_layout(self.seed_layout()?);
        builder = match (self.layout.min_spacing, self.layout.min_spacing_diameters) {
            (Some(meters), _) => builder.min_spacing(meters),
            (None, Some(diameters)) => builder.min_spacing_diameters(diameters),
            (None, None) => builder,
        };
        Ok(builder)
    }

    pub fn build_problem(&self) -> Result<LayoutProblem> {
        Ok(self.problem_builder()?.build()?)
    }
}
