//! Unified error types for the wflo workspace
//!
//! [`WfloError`] covers every failure the layout engine can report. The
//! optimizer's *outcomes* (converged, iteration budget exhausted, infeasible)
//! are not errors: they are carried in the solution's termination state.
//! Errors are reserved for conditions where no meaningful result exists.
//!
//! # Example
//!
//! ```ignore
//! use wflo_core::{WfloError, WfloResult};
//!
//! fn run(problem: &LayoutProblem) -> WfloResult<()> {
//!     let report = problem.evaluator().evaluate(problem.seed_layout())?;
//!     println!("{:.2} GWh", report.total_gwh);
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all wflo operations.
#[derive(Error, Debug)]
pub enum WfloError {
    /// Malformed or empty turbine/boundary/model input. Raised before any
    /// optimization work begins and never recoverable.
    #[error("Input error: {0}")]
    Input(String),

    /// Non-finite value produced by a deficit or AEP computation that is not
    /// one of the known saturating edge cases.
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Subproblem solver failure (QP setup, line search, backend errors)
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors raised by front-ends reading problem files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Problem file parsing errors (TOML or JSON)
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience type alias for Results using WfloError.
pub type WfloResult<T> = Result<T, WfloError>;

impl WfloError {
    /// Shorthand for an input error built from anything displayable
    pub fn input(msg: impl Into<String>) -> Self {
        WfloError::Input(msg.into())
    }

    /// Shorthand for a numerical error
    pub fn numerical(msg: impl Into<String>) -> Self {
        WfloError::Numerical(msg.into())
    }
}

impl From<serde_json::Error> for WfloError {
    fn from(err: serde_json::Error) -> Self {
        WfloError::Parse(err.to_string())
    }
}
