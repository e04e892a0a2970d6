//! Severity filtering and the pass/fail decision.

use crate::level::ErrorLevel;
use crate::result::{Finding, LintResult};

/// Display and failure thresholds of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    fail: ErrorLevel,
    shown: ErrorLevel,
}

impl Thresholds {
    /// `shown` is clamped to `fail`, so nothing that fails the run is hidden.
    pub fn new(fail: ErrorLevel, shown: ErrorLevel) -> Self {
        Self {
            fail,
            shown: shown.min(fail),
        }
    }

    pub fn fail(&self) -> ErrorLevel {
        self.fail
    }

    pub fn shown(&self) -> ErrorLevel {
        self.shown
    }

    /// Flattens `results`, drops findings below the display threshold and
    /// decides whether the run failed.
    pub fn apply(&self, results: &[LintResult]) -> Report {
        let findings: Vec<Finding> = results
            .iter()
            .flat_map(LintResult::flatten)
            .filter(|finding| finding.severity >= self.shown)
            .collect();
        let failed = findings.iter().any(|finding| finding.severity >= self.fail);
        Report { findings, failed }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(ErrorLevel::Error, ErrorLevel::Info)
    }
}

/// Findings that survived filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub failed: bool,
}
