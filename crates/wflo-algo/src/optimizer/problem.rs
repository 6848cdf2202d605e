//! Layout problem definition and builder.
//!
//! [`LayoutProblemBuilder`] validates every input before any optimization
//! work starts. Structural problems (no boundary, empty seed, bad spacing)
//! are input errors; suspicious but solvable inputs end up in the problem's
//! [`Diagnostics`].

use super::Iterate;
use crate::aep::{AepConfig, AepEvaluator};
use crate::constraints::{ConstraintEvaluation, GeometryConstraints, SparseJacobian};
use crate::gradient::{finite_difference_gradient, GradientConfig};
use crate::resource::{SpeedBins, WindResource};
use crate::turbine::TurbinePowerModel;
use crate::wake::WakeModel;
use tracing::warn;
use wflo_core::{BoundaryPolygon, Category, Diagnostics, Layout, WfloError, WfloResult};

/// Default minimum spacing in rotor diameters
pub const DEFAULT_SPACING_DIAMETERS: f64 = 2.0;

/// A fully validated layout optimization problem
#[derive(Debug, Clone)]
pub struct LayoutProblem {
    evaluator: AepEvaluator,
    constraints: GeometryConstraints,
    seed: Layout,
    diagnostics: Diagnostics,
}

impl LayoutProblem {
    pub fn evaluator(&self) -> &AepEvaluator {
        &self.evaluator
    }

    pub fn constraints(&self) -> &GeometryConstraints {
        &self.constraints
    }

    pub fn seed_layout(&self) -> &Layout {
        &self.seed
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn num_turbines(&self) -> usize {
        self.seed.len()
    }

    /// Length of the flat design vector
    pub fn dimension(&self) -> usize {
        2 * self.seed.len()
    }

    pub fn rotor_diameter(&self) -> f64 {
        self.evaluator.turbine().diameter()
    }

    /// Negative AEP of a flat design vector
    pub fn objective(&self, x: &[f64]) -> WfloResult<f64> {
        self.evaluator.objective(x)
    }

    /// Finite-difference gradient of the objective; `f0` is `objective(x)`
    pub fn objective_gradient(
        &self,
        x: &[f64],
        f0: f64,
        config: &GradientConfig,
    ) -> WfloResult<Vec<f64>> {
        finite_difference_gradient(|xp| self.objective(xp), x, f0, config)
    }

    pub fn constraint_evaluation(&self, x: &[f64]) -> WfloResult<ConstraintEvaluation> {
        self.constraints.evaluate(x)
    }

    pub fn constraint_jacobian(&self, x: &[f64]) -> WfloResult<SparseJacobian> {
        self.constraints.jacobian(x)
    }

    /// Objective and constraints at `x`
    pub fn evaluate_point(&self, x: &[f64]) -> WfloResult<Iterate> {
        let objective = self.objective(x)?;
        let constraints = self.constraint_evaluation(x)?;
        Ok(Iterate {
            x: x.to_vec(),
            objective,
            constraints,
        })
    }
}

/// Builder for [`LayoutProblem`]
#[derive(Debug, Clone)]
pub struct LayoutProblemBuilder {
    turbine: TurbinePowerModel,
    resource: WindResource,
    wake: WakeModel,
    aep_config: AepConfig,
    boundary: Option<BoundaryPolygon>,
    min_spacing: Option<f64>,
    seed: Option<Layout>,
}

impl LayoutProblemBuilder {
    /// Start from the turbine type and site climate. The wake model
    /// defaults to Gaussian deficits with squared-sum superposition and
    /// the minimum spacing to two rotor diameters.
    pub fn new(turbine: TurbinePowerModel, resource: WindResource) -> Self {
        Self {
            turbine,
            resource,
            wake: WakeModel::default(),
            aep_config: AepConfig::default(),
            boundary: None,
            min_spacing: None,
            seed: None,
        }
    }

    pub fn wake_model(mut self, wake: WakeModel) -> Self {
        self.wake = wake;
        self
    }

    pub fn aep_config(mut self, config: AepConfig) -> Self {
        self.aep_config = config;
        self
    }

    pub fn speed_bins(mut self, bins: SpeedBins) -> Self {
        self.aep_config.speed_bins = bins;
        self
    }

    pub fn directions_per_sector(mut self, n: usize) -> Self {
        self.aep_config.directions_per_sector = n;
        self
    }

    pub fn boundary(mut self, boundary: BoundaryPolygon) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Minimum center-to-center distance in meters (0 disables spacing)
    pub fn min_spacing(mut self, meters: f64) -> Self {
        self.min_spacing = Some(meters);
        self
    }

    /// Minimum spacing as a multiple of the rotor diameter
    pub fn min_spacing_diameters(mut self, diameters: f64) -> Self {
        self.min_spacing = Some(diameters * self.turbine.diameter());
        self
    }

    pub fn seed_layout(mut self, layout: Layout) -> Self {
        self.seed = Some(layout);
        self
    }

    /// Validate all inputs and assemble the problem
    pub fn build(self) -> WfloResult<LayoutProblem> {
        let boundary = self
            .boundary
            .ok_or_else(|| WfloError::input("layout problem needs a boundary polygon"))?;
        let seed = self
            .seed
            .ok_or_else(|| WfloError::input("layout problem needs a seed layout"))?;
        seed.validate()?;

        let diameter = self.turbine.diameter();
        let min_spacing = self
            .min_spacing
            .unwrap_or(DEFAULT_SPACING_DIAMETERS * diameter);

        let constraints = GeometryConstraints::new(boundary, min_spacing, seed.len())?;
        let evaluator = AepEvaluator::new(self.resource, self.turbine, self.wake, self.aep_config)?;

        let diagnostics = seed_diagnostics(&constraints, &seed, diameter);
        for issue in &diagnostics.issues {
            warn!("layout problem: {}", issue);
        }

        Ok(LayoutProblem {
            evaluator,
            constraints,
            seed,
            diagnostics,
        })
    }
}

fn seed_diagnostics(constraints: &GeometryConstraints, seed: &Layout, diameter: f64) -> Diagnostics {
    let mut diag = Diagnostics::new();
    let min_spacing = constraints.min_spacing();

    if min_spacing == 0.0 {
        diag.warn(Category::Spacing, "minimum spacing is 0, spacing constraints are disabled");
    } else if min_spacing < diameter {
        diag.warn(
            Category::Spacing,
            &format!(
                "minimum spacing {:.1} m is below the rotor diameter {:.1} m",
                min_spacing, diameter
            ),
        );
    }

    for (i, p) in seed.iter().enumerate() {
        let sd = constraints.boundary().signed_distance(p);
        if sd < 0.0 {
            diag.warn_turbine(
                Category::Boundary,
                &format!("seed lies {:.1} m outside the boundary", -sd),
                i,
            );
        }
    }

    if min_spacing > 0.0 {
        let positions = seed.positions();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let d = positions[i].distance(&positions[j]);
                if d < min_spacing {
                    diag.warn_pair(
                        Category::Spacing,
                        &format!("seeds are {:.1} m apart (minimum {:.1} m)", d, min_spacing),
                        i,
                        j,
                    );
                }
            }
        }
    }

    diag
}

#[cfg(test)]
mod tests {
    use super::*;
    use wflo_core::Point;

    fn builder() -> LayoutProblemBuilder {
        LayoutProblemBuilder::new(
            TurbinePowerModel::sg_8_0_167_dd().unwrap(),
            WindResource::uniform(12, 9.0, 2.0).unwrap(),
        )
        .boundary(
            BoundaryPolygon::rectangle(Point::new(0.0, 0.0), Point::new(2000.0, 2000.0)).unwrap(),
        )
    }

    #[test]
    fn test_build_clean_problem() {
        let problem = builder()
            .seed_layout(Layout::new(vec![
                Point::new(300.0, 300.0),
                Point::new(1700.0, 1700.0),
            ]))
            .build()
            .unwrap();

        assert_eq!(problem.dimension(), 4);
        assert_eq!(problem.constraints().min_spacing(), 334.0);
        assert!(problem.diagnostics().is_clean());

        let start = problem.evaluate_point(&problem.seed_layout().to_flat()).unwrap();
        assert!(start.aep_gwh() > 0.0);
        assert!(start.is_feasible(1e-9));
    }

    #[test]
    fn test_missing_inputs_are_errors() {
        let no_seed = builder().build();
        assert!(matches!(no_seed, Err(WfloError::Input(_))));

        let no_boundary = LayoutProblemBuilder::new(
            TurbinePowerModel::sg_8_0_167_dd().unwrap(),
            WindResource::uniform(4, 9.0, 2.0).unwrap(),
        )
        .seed_layout(Layout::new(vec![Point::new(0.0, 0.0)]))
        .build();
        assert!(no_boundary.is_err());

        let empty = builder().seed_layout(Layout::default()).build();
        assert!(empty.is_err());

        let negative = builder()
            .min_spacing(-5.0)
            .seed_layout(Layout::new(vec![Point::new(10.0, 10.0)]))
            .build();
        assert!(negative.is_err());
    }

    #[test]
    fn test_seed_diagnostics() {
        let problem = builder()
            .min_spacing(100.0)
            .seed_layout(Layout::new(vec![
                Point::new(500.0, 500.0),
                Point::new(550.0, 500.0),
                Point::new(-20.0, 800.0),
            ]))
            .build()
            .unwrap();

        let diag = problem.diagnostics();
        // spacing below D, one close pair, one seed outside
        assert_eq!(diag.warning_count(), 3);
        assert_eq!(diag.in_category(Category::Boundary).count(), 1);
        assert!(diag
            .issues
            .iter()
            .any(|i| i.entity.as_deref() == Some("Turbines 0-1")));
    }

    #[test]
    fn test_zero_spacing_reported() {
        let problem = builder()
            .min_spacing(0.0)
            .seed_layout(Layout::new(vec![Point::new(10.0, 10.0), Point::new(10.0, 10.0)]))
            .build()
            .unwrap();
        assert_eq!(problem.constraints().num_spacing(), 0);
        assert_eq!(problem.diagnostics().warning_count(), 1);
    }

    #[test]
    fn test_spacing_in_diameters() {
        let problem = builder()
            .min_spacing_diameters(3.0)
            .seed_layout(Layout::new(vec![Point::new(1000.0, 1000.0)]))
            .build()
            .unwrap();
        assert!((problem.constraints().min_spacing() - 501.0).abs() < 1e-9);
    }
}
