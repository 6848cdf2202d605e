//! Diagnostics collected while validating a layout problem.
//!
//! Structural input errors abort with [`crate::WfloError::Input`]. Everything
//! that is suspicious but still solvable (a seed outside the boundary, a
//! minimum spacing smaller than the rotor diameter, two seeds closer than the
//! spacing limit) is recorded here instead and surfaced to the caller.
//!
//! # Example
//!
//! ```
//! use wflo_core::diagnostics::{Category, Diagnostics};
//!
//! let mut diag = Diagnostics::new();
//! diag.warn(Category::Spacing, "minimum spacing is below the rotor diameter");
//! diag.warn_turbine(Category::Boundary, "seed lies outside the boundary", 3);
//!
//! assert_eq!(diag.warning_count(), 2);
//! assert_eq!(diag.in_category(Category::Boundary).count(), 1);
//! assert!(!diag.has_errors());
//! ```

use serde::Serialize;
use std::fmt;

/// How bad an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but the run can proceed
    Warning,
    /// The input cannot be used as given
    Error,
}

/// Part of the layout problem an issue refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Turbine,
    Site,
    Wake,
    Layout,
    Boundary,
    Spacing,
    Problem,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Turbine => "turbine",
            Self::Site => "site",
            Self::Wake => "wake",
            Self::Layout => "layout",
            Self::Boundary => "boundary",
            Self::Spacing => "spacing",
            Self::Problem => "problem",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding, optionally pinned to a turbine or a turbine pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    /// "Turbine 3" or "Turbines 0-1"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        match &self.entity {
            Some(entity) => write!(f, " ({})", entity),
            None => Ok(()),
        }
    }
}

/// Ordered list of issues found in one problem
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, severity: Severity, category: Category, message: &str, entity: Option<String>) {
        self.issues.push(DiagnosticIssue {
            severity,
            category,
            message: message.to_string(),
            entity,
        });
    }

    pub fn warn(&mut self, category: Category, message: &str) {
        self.push(Severity::Warning, category, message, None);
    }

    /// Warning about a single turbine
    pub fn warn_turbine(&mut self, category: Category, message: &str, index: usize) {
        self.push(Severity::Warning, category, message, Some(format!("Turbine {}", index)));
    }

    /// Warning about the turbine pair `(i, j)`
    pub fn warn_pair(&mut self, category: Category, message: &str, i: usize, j: usize) {
        self.push(Severity::Warning, category, message, Some(format!("Turbines {}-{}", i, j)));
    }

    pub fn error(&mut self, category: Category, message: &str) {
        self.push(Severity::Error, category, message, None);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    /// Append all issues of `other`, keeping their order.
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    /// "No issues", "2 warnings", "1 warning, 3 errors"
    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            (self.warning_count(), "warning"),
            (self.error_count(), "error"),
        ]
        .into_iter()
        .filter(|&(n, _)| n > 0)
        .map(|(n, noun)| format!("{} {}{}", n, noun, if n == 1 { "" } else { "s" }))
        .collect();

        if parts.is_empty() {
            "No issues".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut diag = Diagnostics::new();
        assert!(diag.is_clean());
        diag.warn(Category::Spacing, "seeds too close");
        diag.error(Category::Site, "sector frequencies sum to zero");
        diag.warn_turbine(Category::Boundary, "outside", 0);

        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert!(!diag.is_clean());
        assert!(diag.has_errors());
    }

    #[test]
    fn serializes_lowercase_with_entity() {
        let mut diag = Diagnostics::new();
        diag.warn_turbine(Category::Boundary, "seed lies outside", 4);

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"warning\""));
        assert!(json.contains("\"boundary\""));
        assert!(json.contains("\"entity\": \"Turbine 4\""));
    }

    #[test]
    fn issue_display_names_the_pair() {
        let mut diag = Diagnostics::new();
        diag.warn_pair(Category::Spacing, "pair below limit", 1, 2);
        assert_eq!(
            diag.issues[0].to_string(),
            "[warning:spacing] pair below limit (Turbines 1-2)"
        );
    }

    #[test]
    fn summary_pluralizes() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");

        diag.warn(Category::Spacing, "a");
        assert_eq!(diag.summary(), "1 warning");

        diag.error(Category::Boundary, "b");
        assert_eq!(diag.summary(), "1 warning, 1 error");

        diag.warn(Category::Spacing, "c");
        assert_eq!(diag.summary(), "2 warnings, 1 error");

        let mut errors_only = Diagnostics::new();
        errors_only.error(Category::Turbine, "d");
        errors_only.error(Category::Wake, "e");
        assert_eq!(errors_only.summary(), "2 errors");
    }

    #[test]
    fn merge_keeps_order_and_categories() {
        let mut first = Diagnostics::new();
        first.warn(Category::Spacing, "a");

        let mut second = Diagnostics::new();
        second.warn(Category::Boundary, "b");
        second.warn(Category::Spacing, "c");

        first.merge(second);
        assert_eq!(first.in_category(Category::Spacing).count(), 2);
        assert_eq!(first.in_category(Category::Boundary).count(), 1);
        assert_eq!(first.issues[2].message, "c");
    }
}
