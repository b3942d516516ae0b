//! Conformance testing harness for tlibc.
//!
//! This crate provides:
//! - Fixtures: JSON format cases and mapping scenarios with expected results
//! - Runner: executes fixtures against `tlibc-core` in strict or hardened mode
//! - Structured logging: canonical JSONL records plus a SHA-256 artifact index
//! - The `harness` CLI (`verify`, `smoke`)

#![forbid(unsafe_code)]

pub mod error;
pub mod fixtures;
pub mod runner;
pub mod structured_log;
pub mod verify;

pub use error::HarnessError;
pub use fixtures::{FixtureSet, FormatCase, MapScenario};
pub use runner::TestRunner;
pub use verify::{VerificationResult, VerificationSummary};
