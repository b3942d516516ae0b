//! Output comparison and verification.

use serde::{Deserialize, Serialize};

/// Result of verifying a single fixture case or scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Case name, suffixed with the mode for cases that run in both.
    pub case_name: String,
    /// `stdio` or `mmap`.
    pub family: String,
    /// Entry point the case models (`snprintf`, `asprintf`, `mmap`).
    pub symbol: String,
    pub mode: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    /// errno of the failure the case observed, if any.
    pub errno: Option<i32>,
    /// Explanation when the case failed.
    pub diff: Option<String>,
}

/// Aggregate verification summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<VerificationResult>,
}

impl VerificationSummary {
    /// Build a summary from a list of results.
    #[must_use]
    pub fn from_results(results: Vec<VerificationResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total,
            passed,
            failed: total - passed,
            results,
        }
    }

    /// Returns true if every case passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Render a two-line expected/actual diff.
#[must_use]
pub fn render_diff(expected: &str, actual: &str) -> String {
    format!("- expected: {expected:?}\n+ actual:   {actual:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, passed: bool) -> VerificationResult {
        VerificationResult {
            case_name: name.to_string(),
            family: "stdio".to_string(),
            symbol: "asprintf".to_string(),
            mode: "strict".to_string(),
            passed,
            expected: "x".to_string(),
            actual: (if passed { "x" } else { "y" }).to_string(),
            errno: None,
            diff: None,
        }
    }

    #[test]
    fn summary_counts() {
        let summary = VerificationSummary::from_results(vec![
            result("a", true),
            result("b", false),
            result("c", true),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_passed());
    }

    #[test]
    fn diff_quotes_both_sides() {
        let diff = render_diff("a\n", "b");
        assert!(diff.contains("\"a\\n\""));
        assert!(diff.contains("\"b\""));
    }
}
