//! CLI entrypoint for the tlibc conformance harness.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tlibc_core::config::SafetyLevel;
use tlibc_harness::structured_log::{ArtifactIndex, LogEmitter};
use tlibc_harness::{FixtureSet, HarnessError, TestRunner, VerificationResult, VerificationSummary};

/// Conformance tooling for tlibc.
#[derive(Debug, Parser)]
#[command(name = "tlibc-harness")]
#[command(about = "Conformance testing harness for tlibc")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Strict,
    Hardened,
    Both,
}

impl ModeArg {
    fn levels(self) -> &'static [SafetyLevel] {
        match self {
            Self::Strict => &[SafetyLevel::Strict],
            Self::Hardened => &[SafetyLevel::Hardened],
            Self::Both => &[SafetyLevel::Strict, SafetyLevel::Hardened],
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify the implementation against a fixture file.
    Verify {
        /// Fixture JSON file.
        #[arg(long)]
        fixture: PathBuf,
        /// Structured JSONL log output (stdout if omitted).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Safety level(s) to run.
        #[arg(long, value_enum, default_value = "both")]
        mode: ModeArg,
        /// Artifact index JSON output, recording digests of the fixture and log.
        #[arg(long)]
        artifact_index: Option<PathBuf>,
    },
    /// Run the bundled fixtures in both modes.
    Smoke {
        /// Structured JSONL log output (stdout if omitted).
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

fn run_levels(
    campaign: &str,
    set: &FixtureSet,
    levels: &[SafetyLevel],
    log: Option<&Path>,
) -> Result<Vec<VerificationResult>, HarnessError> {
    let writer: Box<dyn Write> = match log {
        Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    let mut emitter = LogEmitter::new(writer, campaign);
    let mut results = Vec::new();
    for &level in levels {
        results.extend(TestRunner::new(campaign, level).run_logged(set, &mut emitter)?);
    }
    emitter.flush()?;
    Ok(results)
}

fn report(summary: &VerificationSummary) {
    for result in summary.results.iter().filter(|r| !r.passed) {
        eprintln!("FAIL {} ({}/{})", result.case_name, result.family, result.mode);
        if let Some(diff) = &result.diff {
            eprintln!("{diff}");
        }
    }
    eprintln!(
        "{} cases: {} passed, {} failed",
        summary.total, summary.passed, summary.failed
    );
}

fn run(cli: Cli) -> Result<bool, HarnessError> {
    match cli.command {
        Command::Verify {
            fixture,
            log,
            mode,
            artifact_index,
        } => {
            eprintln!("Verifying against {}", fixture.display());
            let set = FixtureSet::from_file(&fixture)?;
            let results = run_levels("verify", &set, mode.levels(), log.as_deref())?;
            let summary = VerificationSummary::from_results(results);
            report(&summary);

            if let Some(index_path) = artifact_index {
                let mut index = ArtifactIndex::new("verify");
                index.add_file(&fixture, "fixture")?;
                if let Some(log_path) = &log {
                    index.add_file(log_path, "log")?;
                }
                index.add_bytes(
                    "summary.json",
                    "summary",
                    serde_json::to_string(&summary)?.as_bytes(),
                );
                std::fs::write(&index_path, index.to_json()?)?;
            }
            Ok(summary.all_passed())
        }
        Command::Smoke { log } => {
            let set = FixtureSet::bundled()?;
            let results = run_levels("smoke", &set, ModeArg::Both.levels(), log.as_deref())?;
            let summary = VerificationSummary::from_results(results);
            report(&summary);
            Ok(summary.all_passed())
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("harness: {err}");
            ExitCode::from(2)
        }
    }
}
