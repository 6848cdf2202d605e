//! # wflo-core: Wind Farm Layout Primitives
//!
//! Shared data structures for wake-aware layout optimization. Everything in
//! this crate is pure data plus geometry; the numerical engines live in
//! `wflo-algo` and file handling in `wflo-cli`.
//!
//! ## Coordinate Conventions
//!
//! - Positions are meters in a planar projected system (x east, y north).
//! - Wind directions are meteorological: the direction the wind blows
//!   **from**, degrees clockwise from north (270° = westerly wind).
//! - Optimizers see a layout as a flat vector `[x_0..x_{N-1}, y_0..y_{N-1}]`.
//! - Constraint values follow the "≥ 0 feasible" convention.
//!
//! ## Quick Start
//!
//! ```rust
//! use wflo_core::*;
//!
//! let boundary = BoundaryPolygon::rectangle(
//!     Point::new(0.0, 0.0),
//!     Point::new(2000.0, 2000.0),
//! ).unwrap();
//!
//! let layout = Layout::new(vec![
//!     Point::new(200.0, 200.0),
//!     Point::new(1800.0, 200.0),
//! ]);
//!
//! assert!(layout.iter().all(|p| boundary.signed_distance(p) > 0.0));
//! assert_eq!(layout.to_flat(), vec![200.0, 1800.0, 200.0, 200.0]);
//! ```
//!
//! ## Modules
//!
//! - [`geometry`] - [`Point`], [`Layout`] and flat design vector indexing
//! - [`polygon`] - [`BoundaryPolygon`] validation and signed distance
//! - [`units`] - newtype units (m, kW, GWh)
//! - [`diagnostics`] - non-fatal issues found while validating inputs
//! - [`error`] - [`WfloError`] and [`WfloResult`]

pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod polygon;
pub mod units;

pub use diagnostics::{Category, DiagnosticIssue, Diagnostics, Severity};
pub use error::{WfloError, WfloResult};
pub use geometry::{x_index, y_index, Layout, Point};
pub use polygon::{BoundaryPolygon, BoundaryProjection};
pub use units::{GigawattHours, Kilowatts, Meters, HOURS_PER_YEAR};
