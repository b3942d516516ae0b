//! Test execution engine.

use std::io::Write;

use tlibc_core::config::{PAGE_SIZE, SafetyLevel};
use tlibc_core::errno::errno_name;
use tlibc_core::mmap::{MapRequest, RegionManager};
use tlibc_core::stdio::{Arg, ArgList, BoundedSink, GrowableSink, Sink, checked_c_int, vformat};
use tlibc_core::{FormatError, MapError};

use crate::error::HarnessError;
use crate::fixtures::{
    AddrRef, AddrTarget, Expect, FixtureArg, FixtureSet, FormatCase, MapScenario, MapStep,
};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
use crate::verify::{VerificationResult, render_diff};

/// Base address of the synthetic arena scenarios run against. Nothing is
/// ever dereferenced there.
pub const SCENARIO_ARENA_BASE: usize = 0x1000_0000;

/// Runs a fixture set in one safety level and collects verification results.
pub struct TestRunner {
    /// Name of the test campaign.
    pub campaign: String,
    pub level: SafetyLevel,
}

impl TestRunner {
    #[must_use]
    pub fn new(campaign: impl Into<String>, level: SafetyLevel) -> Self {
        Self {
            campaign: campaign.into(),
            level,
        }
    }

    /// Run every case whose mode matches this runner's level.
    pub fn run(&self, set: &FixtureSet) -> Result<Vec<VerificationResult>, HarnessError> {
        let mut results = Vec::new();
        for case in set
            .format_cases
            .iter()
            .filter(|c| mode_matches(self.level, &c.mode))
        {
            results.push(run_format_case(case, self.level));
        }
        for scenario in set
            .map_scenarios
            .iter()
            .filter(|s| mode_matches(self.level, &s.mode))
        {
            results.push(run_map_scenario(scenario, self.level)?);
        }
        Ok(results)
    }

    /// [`run`](Self::run), logging a `case_result` entry per case between
    /// `run_start` and `run_end`.
    pub fn run_logged<W: Write>(
        &self,
        set: &FixtureSet,
        emitter: &mut LogEmitter<W>,
    ) -> Result<Vec<VerificationResult>, HarnessError> {
        let mode = self.level.as_str();
        emitter.emit_entry(
            LogEntry::new(String::new(), LogLevel::Info, "run_start")
                .with_mode(mode)
                .with_details(serde_json::json!({
                    "campaign": self.campaign,
                    "cases": set.len(),
                })),
        )?;
        let results = self.run(set)?;
        for result in &results {
            let (level, outcome) = if result.passed {
                (LogLevel::Info, Outcome::Pass)
            } else {
                (LogLevel::Warn, Outcome::Fail)
            };
            let mut entry = LogEntry::new(String::new(), level, "case_result")
                .with_mode(mode)
                .with_api(&result.family, &result.symbol)
                .with_case(&result.case_name)
                .with_outcome(outcome)
                .with_details(serde_json::json!({
                    "expected": result.expected,
                    "actual": result.actual,
                    "diff": result.diff,
                }));
            if let Some(errno) = result.errno {
                entry = entry.with_errno(errno);
            }
            emitter.emit_entry(entry)?;
        }
        let failed = results.iter().filter(|r| !r.passed).count();
        emitter.emit_entry(
            LogEntry::new(
                String::new(),
                if failed == 0 { LogLevel::Info } else { LogLevel::Error },
                "run_end",
            )
            .with_mode(mode)
            .with_outcome(if failed == 0 { Outcome::Pass } else { Outcome::Fail })
            .with_details(serde_json::json!({
                "total": results.len(),
                "failed": failed,
            })),
        )?;
        emitter.flush()?;
        Ok(results)
    }
}

fn mode_matches(level: SafetyLevel, case_mode: &str) -> bool {
    let case = case_mode.to_ascii_lowercase();
    case == "both" || case == level.as_str()
}

fn display_name(name: &str, case_mode: &str, level: SafetyLevel) -> String {
    if case_mode.eq_ignore_ascii_case("both") {
        format!("{name} [{}]", level.as_str())
    } else {
        name.to_string()
    }
}

// ---------------------------------------------------------------------------
// Format cases
// ---------------------------------------------------------------------------

struct FormatRun {
    ret: i64,
    text: Vec<u8>,
    errno: Option<i32>,
    counts: Vec<i64>,
}

fn execute_format(case: &FormatCase, level: SafetyLevel) -> FormatRun {
    let args: Vec<Arg<'_>> = case.args.iter().map(FixtureArg::as_arg).collect();
    let mut cursor = ArgList::new(&args);
    let fmt = case.format.as_bytes();

    let outcome: Result<(usize, Vec<u8>), FormatError> = match case.capacity {
        Some(capacity) => {
            let mut buf = vec![0u8; capacity];
            let mut sink = BoundedSink::new(&mut buf);
            let result = vformat(fmt, &mut cursor, &mut sink, level).and_then(|_| sink.finish());
            result.map(|summary| (summary.wanted, buf[..summary.stored].to_vec()))
        }
        None => {
            let mut sink = GrowableSink::new();
            let result = vformat(fmt, &mut cursor, &mut sink, level).and_then(|_| sink.finish());
            result.map(|grown| (grown.len, grown.as_bytes().to_vec()))
        }
    };

    let counts = cursor.counts().to_vec();
    match outcome.and_then(|(wanted, text)| checked_c_int(wanted).map(|n| (n, text))) {
        Ok((n, text)) => FormatRun {
            ret: i64::from(n),
            text,
            errno: None,
            counts,
        },
        Err(err) => FormatRun {
            ret: -1,
            text: Vec::new(),
            errno: Some(err.errno()),
            counts,
        },
    }
}

fn run_format_case(case: &FormatCase, level: SafetyLevel) -> VerificationResult {
    let run = execute_format(case, level);
    let text = String::from_utf8_lossy(&run.text).into_owned();

    let mut problems = Vec::new();
    if run.ret != case.expected_return {
        problems.push(format!(
            "return: expected {}, got {}",
            case.expected_return, run.ret
        ));
    }
    if run.ret >= 0 && text != case.expected {
        problems.push(render_diff(&case.expected, &text));
    }
    if let Some(want) = &case.expected_errno {
        let got = run.errno.map_or("OK", errno_name);
        if want != got {
            problems.push(format!("errno: expected {want}, got {got}"));
        }
    }
    if let Some(want) = &case.expected_counts
        && *want != run.counts
    {
        problems.push(format!("%n counts: expected {want:?}, got {:?}", run.counts));
    }

    VerificationResult {
        case_name: display_name(&case.name, &case.mode, level),
        family: "stdio".to_string(),
        symbol: (if case.capacity.is_some() { "snprintf" } else { "asprintf" }).to_string(),
        mode: level.as_str().to_string(),
        passed: problems.is_empty(),
        expected: format!("{:?} -> {}", case.expected, case.expected_return),
        actual: format!("{text:?} -> {}", run.ret),
        errno: run.errno,
        diff: (!problems.is_empty()).then(|| problems.join("\n")),
    }
}

// ---------------------------------------------------------------------------
// Map scenarios
// ---------------------------------------------------------------------------

fn resolve(
    scenario: &str,
    addr: &AddrRef,
    produced: &[Option<usize>],
) -> Result<usize, HarnessError> {
    match addr.target() {
        Some(AddrTarget::Absolute(a)) => Ok(a),
        Some(AddrTarget::Base { offset }) => Ok(SCENARIO_ARENA_BASE + offset),
        Some(AddrTarget::Step { index, offset }) => produced
            .get(index)
            .copied()
            .flatten()
            .map(|a| a + offset)
            .ok_or_else(|| {
                HarnessError::fixture(scenario, format!("step @{index} produced no address"))
            }),
        None => Err(HarnessError::fixture(
            scenario,
            format!("malformed address reference {addr:?}"),
        )),
    }
}

fn describe(result: &Result<Option<usize>, MapError>) -> String {
    match result {
        Ok(Some(addr)) => format!("ok at {addr:#x}"),
        Ok(None) => "ok".to_string(),
        Err(err) => format!("{err:?}"),
    }
}

fn run_map_scenario(
    scenario: &MapScenario,
    level: SafetyLevel,
) -> Result<VerificationResult, HarnessError> {
    let name = scenario.name.as_str();
    let mut manager = RegionManager::new(
        SCENARIO_ARENA_BASE,
        scenario.arena_pages * PAGE_SIZE,
        PAGE_SIZE,
    )
    .map_err(|e| HarnessError::fixture(name, format!("bad arena: {e}")))?
    .with_level(level);

    let mut produced: Vec<Option<usize>> = Vec::with_capacity(scenario.steps.len());
    let mut failure = None;
    let mut last_errno = None;

    for (i, step) in scenario.steps.iter().enumerate() {
        let (result, expect) = match step {
            MapStep::Map {
                addr,
                len,
                prot,
                flags,
                expect,
            } => {
                let req = MapRequest {
                    addr: resolve(name, addr, &produced)?,
                    len: *len,
                    prot: *prot,
                    flags: *flags,
                    fd: -1,
                    offset: 0,
                };
                (manager.map(req).map(Some), expect)
            }
            MapStep::Unmap { addr, len, expect } => {
                let addr = resolve(name, addr, &produced)?;
                (manager.unmap(addr, *len).map(|()| None), expect)
            }
            MapStep::Protect {
                addr,
                len,
                prot,
                expect,
            } => {
                let addr = resolve(name, addr, &produced)?;
                (manager.protect(addr, *len, *prot).map(|()| None), expect)
            }
        };
        if let Err(err) = &result {
            last_errno = Some(err.errno());
        }

        let matched = match expect {
            Expect::Named(want) if want == "ok" => result.is_ok(),
            Expect::Named(want) => matches!(&result, Err(err) if format!("{err:?}") == *want),
            Expect::At { at } => {
                let want = resolve(name, at, &produced)?;
                result == Ok(Some(want))
            }
        };
        produced.push(result.as_ref().ok().copied().flatten());
        if !matched {
            failure = Some(format!(
                "step {i}: expected {expect:?}, got {}",
                describe(&result)
            ));
            break;
        }
    }

    if failure.is_none() && manager.mapped_bytes() + manager.free_bytes() != manager.arena_len() {
        failure = Some(format!(
            "accounting: mapped {} + free {} != arena {}",
            manager.mapped_bytes(),
            manager.free_bytes(),
            manager.arena_len()
        ));
    }

    let steps = scenario.steps.len();
    Ok(VerificationResult {
        case_name: display_name(name, &scenario.mode, level),
        family: "mmap".to_string(),
        symbol: "mmap".to_string(),
        mode: level.as_str().to_string(),
        passed: failure.is_none(),
        expected: format!("{steps} steps as expected"),
        actual: match &failure {
            Some(msg) => msg.clone(),
            None => format!("{steps} steps as expected"),
        },
        errno: last_errno,
        diff: failure,
    })
}
