//! # wflo-algo: Wake-Aware Energy Yield and Layout Optimization
//!
//! This crate estimates the annual energy production (AEP) of a wind farm
//! layout under a sectorized Weibull wind climate and moves the turbines
//! inside a site boundary to maximize it.
//!
//! ## Energy Yield
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`WindResource`] | Direction sectors with frequencies and Weibull speed distributions |
//! | [`TurbinePowerModel`] | Power and thrust curves (generic cubic or tabulated) |
//! | [`WakeModel`] | Deficit shape ([`DeficitModel`]) plus [`Superposition`] rule |
//! | [`AepEvaluator`] | Probability-weighted yield, per turbine and per sector |
//!
//! ```text
//! AEP = 8760 h · Σ_sector Σ_bin  f_s · P(v_b | s) · Σ_t P_t(u_t(v_b, θ_s)) / 10⁶   (GWh)
//! ```
//!
//! ## Layout Optimization
//!
//! - [`GeometryConstraints`]: boundary containment and minimum spacing with
//!   sparse Jacobians
//! - [`gradient`]: parallel finite-difference AEP gradients
//! - [`optimizer`]: problem builder, driver state machine and the SQP
//!   (Clarabel) and penalty L-BFGS (argmin) backends
//!
//! ## Example
//!
//! ```no_run
//! use wflo_algo::{AepConfig, AepEvaluator, TurbinePowerModel, WakeModel, WindResource};
//! use wflo_core::{Layout, Point};
//!
//! let evaluator = AepEvaluator::new(
//!     WindResource::uniform(12, 9.0, 2.0)?,
//!     TurbinePowerModel::sg_8_0_167_dd()?,
//!     WakeModel::default(),
//!     AepConfig::default(),
//! )?;
//!
//! let layout = Layout::new(vec![Point::new(0.0, 0.0), Point::new(800.0, 0.0)]);
//! let report = evaluator.evaluate(&layout)?;
//! println!("AEP: {:.2} GWh/year, wake loss {:.1}%", report.total_gwh, report.wake_loss_percent());
//! # Ok::<(), wflo_core::WfloError>(())
//! ```

pub mod aep;
pub mod constraints;
pub mod gradient;
pub mod optimizer;
pub mod resource;
pub mod turbine;
pub mod wake;

pub use aep::{AepConfig, AepEvaluator, AepReport};
pub use constraints::{ConstraintEvaluation, GeometryConstraints, SparseJacobian};
pub use gradient::{finite_difference_gradient, FiniteDifference, GradientConfig};
pub use optimizer::{
    optimize_layout, LayoutOptimizer, LayoutProblem, LayoutProblemBuilder, LayoutSolution,
    OptimizationPhase, OptimizerAlgorithm, OptimizerConfig,
};
pub use resource::{Sector, SpeedBins, WindResource};
pub use turbine::{PowerCurve, TurbinePowerModel};
pub use wake::{DeficitModel, Superposition, WakeModel};
