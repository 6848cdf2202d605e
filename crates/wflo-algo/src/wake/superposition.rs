//! Combination of overlapping wake deficits.
//!
//! ```text
//! LinearSum:   δ = Σ δ_s
//! SquaredSum:  δ = √(Σ δ_s²)
//! Max:         δ = max δ_s
//! ```
//!
//! The combined deficit is clamped to `[0, 1]` so effective speeds never go
//! negative.

use serde::{Deserialize, Serialize};

/// Superposition rule for deficits from several upstream turbines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Superposition {
    LinearSum,
    #[default]
    SquaredSum,
    Max,
}

impl Superposition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LinearSum => "linear-sum",
            Self::SquaredSum => "squared-sum",
            Self::Max => "max",
        }
    }

    /// Fold one more single-wake deficit into the running accumulator
    #[inline]
    pub fn accumulate(&self, acc: f64, deficit: f64) -> f64 {
        match self {
            Self::LinearSum => acc + deficit,
            Self::SquaredSum => acc + deficit * deficit,
            Self::Max => acc.max(deficit),
        }
    }

    /// Turn the accumulator into the combined deficit, clamped to `[0, 1]`
    #[inline]
    pub fn finish(&self, acc: f64) -> f64 {
        let combined = match self {
            Self::SquaredSum => acc.sqrt(),
            Self::LinearSum | Self::Max => acc,
        };
        combined.clamp(0.0, 1.0)
    }

    /// Combine a full set of deficits
    pub fn combine<I: IntoIterator<Item = f64>>(&self, deficits: I) -> f64 {
        let acc = deficits
            .into_iter()
            .fold(0.0, |acc, d| self.accumulate(acc, d));
        self.finish(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules() {
        let d = [0.3, 0.4];
        assert!((Superposition::LinearSum.combine(d) - 0.7).abs() < 1e-15);
        assert!((Superposition::SquaredSum.combine(d) - 0.5).abs() < 1e-15);
        assert_eq!(Superposition::Max.combine(d), 0.4);
    }

    #[test]
    fn test_empty_is_zero() {
        for rule in [Superposition::LinearSum, Superposition::SquaredSum, Superposition::Max] {
            assert_eq!(rule.combine(std::iter::empty()), 0.0);
        }
    }

    #[test]
    fn test_clamped_to_unit_interval() {
        assert_eq!(Superposition::LinearSum.combine([0.8, 0.9]), 1.0);
        assert_eq!(Superposition::SquaredSum.combine([1.0, 1.0]), 1.0);
    }

    #[test]
    fn test_default_is_squared_sum() {
        assert_eq!(Superposition::default(), Superposition::SquaredSum);
        let parsed: Superposition = serde_json::from_str("\"linear-sum\"").unwrap();
        assert_eq!(parsed, Superposition::LinearSum);
    }
}
