//! Layout optimization backends.
//!
//! | Backend                 | Subproblem                | Constraints         |
//! |-------------------------|---------------------------|---------------------|
//! | [`SqpBackend`]          | Clarabel QP per step      | linearized, elastic |
//! | [`PenaltyLbfgsBackend`] | argmin L-BFGS per step    | quadratic penalty   |

mod penalty;
mod sqp;

pub use penalty::PenaltyLbfgsBackend;
pub use sqp::SqpBackend;

use super::{LayoutBackend, OptimizerAlgorithm};

/// Instantiate the backend for `algorithm`
pub fn create_backend(algorithm: OptimizerAlgorithm) -> Box<dyn LayoutBackend> {
    match algorithm {
        OptimizerAlgorithm::Sqp => Box::new(SqpBackend::new()),
        OptimizerAlgorithm::PenaltyLbfgs => Box::new(PenaltyLbfgsBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_backend_ids() {
        assert_eq!(create_backend(OptimizerAlgorithm::Sqp).id(), "sqp");
        assert_eq!(
            create_backend(OptimizerAlgorithm::PenaltyLbfgs).id(),
            OptimizerAlgorithm::PenaltyLbfgs.as_str()
        );
    }
}
