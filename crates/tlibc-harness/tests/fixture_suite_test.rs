//! Runs the bundled fixture suite end to end in both safety levels.

use tlibc_core::config::SafetyLevel;
use tlibc_harness::structured_log::{LogEmitter, validate_log_line};
use tlibc_harness::{FixtureSet, TestRunner, VerificationSummary};

const FIXTURES: &str = include_str!("../fixtures/core_fixtures.json");

#[test]
fn bundled_fixtures_pass_in_both_modes() {
    let set = FixtureSet::from_json(FIXTURES).unwrap();
    for level in [SafetyLevel::Strict, SafetyLevel::Hardened] {
        let results = TestRunner::new("suite", level).run(&set).unwrap();
        assert!(!results.is_empty());
        let failures: Vec<String> = results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| format!("{}: {}", r.case_name, r.diff.clone().unwrap_or_default()))
            .collect();
        assert!(failures.is_empty(), "{failures:#?}");
    }
}

#[test]
fn mode_specific_cases_run_once() {
    let set = FixtureSet::from_json(FIXTURES).unwrap();
    let strict = TestRunner::new("suite", SafetyLevel::Strict).run(&set).unwrap();
    let hardened = TestRunner::new("suite", SafetyLevel::Hardened).run(&set).unwrap();
    assert!(strict.iter().any(|r| r.case_name == "count_stored"));
    assert!(!strict.iter().any(|r| r.case_name == "count_suppressed"));
    assert!(hardened.iter().any(|r| r.case_name == "hardened_repairs_flags"));
    assert!(
        hardened
            .iter()
            .any(|r| r.case_name == "null_string [hardened]")
    );
}

#[test]
fn logged_suite_is_schema_valid() {
    let set = FixtureSet::from_json(FIXTURES).unwrap();
    let mut emitter = LogEmitter::new(Vec::new(), "suite");
    let results = TestRunner::new("suite", SafetyLevel::Strict)
        .run_logged(&set, &mut emitter)
        .unwrap();
    let summary = VerificationSummary::from_results(results);
    assert!(summary.all_passed());

    let text = String::from_utf8(emitter.into_inner().unwrap()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), summary.total + 2);
    for (i, line) in lines.iter().enumerate() {
        let entry = validate_log_line(line, i + 1).unwrap();
        assert_eq!(entry.mode.as_deref(), Some("strict"));
    }
    let last: serde_json::Value = serde_json::from_str(lines[lines.len() - 1]).unwrap();
    assert_eq!(last["event"], "run_end");
    assert_eq!(last["details"]["failed"], 0);
}
