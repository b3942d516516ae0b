//! Fixture loading and management.
//!
//! A fixture file holds two kinds of cases:
//!
//! - format cases: one formatting call with typed arguments, an optional
//!   bounded capacity and the expected text and return value;
//! - map scenarios: a sequence of `map`/`unmap`/`protect` steps against a
//!   fresh arena, where later steps may refer to addresses returned by
//!   earlier ones (`"@N"`, `"@N+K"`) or to the arena base (`"base+K"`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tlibc_core::stdio::Arg;

use crate::error::HarnessError;

/// Fixture schema version this harness understands.
pub const FIXTURE_VERSION: u32 = 1;

/// Fixtures shipped with the harness, run by `harness smoke`.
pub const BUNDLED_FIXTURES: &str = include_str!("../fixtures/core_fixtures.json");

fn default_mode() -> String {
    "both".to_string()
}

/// One argument of a format case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FixtureArg {
    Int(i64),
    Uint(u64),
    Double(f64),
    Ptr(usize),
    Str(String),
    NullStr,
    /// `wchar_t` code units, without the terminator.
    WideStr(Vec<u32>),
    Count,
}

impl FixtureArg {
    /// Borrow as an engine argument.
    #[must_use]
    pub fn as_arg(&self) -> Arg<'_> {
        match self {
            Self::Int(v) => Arg::Int(*v),
            Self::Uint(v) => Arg::Uint(*v),
            Self::Double(v) => Arg::Double(*v),
            Self::Ptr(v) => Arg::Ptr(*v),
            Self::Str(s) => Arg::Str(Some(s.as_bytes())),
            Self::NullStr => Arg::Str(None),
            Self::WideStr(units) => Arg::WideStr(Some(units)),
            Self::Count => Arg::Count,
        }
    }
}

/// A single formatting call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatCase {
    pub name: String,
    pub format: String,
    #[serde(default)]
    pub args: Vec<FixtureArg>,
    /// Bounded-sink capacity; absent means a growable sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    /// Stored text (without terminator). Ignored when the call fails.
    #[serde(default)]
    pub expected: String,
    /// `wanted`, or -1 when the call must fail.
    pub expected_return: i64,
    /// errno name of the expected failure (`"EINVAL"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_errno: Option<String>,
    /// Values stored by `%n` conversions, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_counts: Option<Vec<i64>>,
    /// `strict`, `hardened` or `both`.
    #[serde(default = "default_mode")]
    pub mode: String,
}

/// Address operand of a mapping step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddrRef {
    Absolute(usize),
    /// `"@N"`, `"@N+K"`, `"base"` or `"base+K"`.
    Symbolic(String),
}

impl Default for AddrRef {
    fn default() -> Self {
        Self::Absolute(0)
    }
}

/// Parsed form of [`AddrRef::Symbolic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrTarget {
    Absolute(usize),
    Step { index: usize, offset: usize },
    Base { offset: usize },
}

impl AddrRef {
    /// Parse the operand; `None` if the symbolic form is malformed.
    #[must_use]
    pub fn target(&self) -> Option<AddrTarget> {
        let text = match self {
            Self::Absolute(addr) => return Some(AddrTarget::Absolute(*addr)),
            Self::Symbolic(text) => text.trim(),
        };
        let (head, offset) = match text.split_once('+') {
            Some((head, off)) => (head.trim(), parse_number(off.trim())?),
            None => (text, 0),
        };
        if head == "base" {
            return Some(AddrTarget::Base { offset });
        }
        let index = head.strip_prefix('@')?.parse().ok()?;
        Some(AddrTarget::Step { index, offset })
    }
}

fn parse_number(text: &str) -> Option<usize> {
    match text.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Expected result of a mapping step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expect {
    /// `{"at": "@N"}`: a map that must land at the given address.
    At { at: AddrRef },
    /// `"ok"` or a `MapError` variant name (`"AddressInUse"`).
    Named(String),
}

impl Default for Expect {
    fn default() -> Self {
        Self::Named("ok".to_string())
    }
}

/// One step of a mapping scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapStep {
    Map {
        #[serde(default)]
        addr: AddrRef,
        len: usize,
        prot: i32,
        flags: i32,
        #[serde(default)]
        expect: Expect,
    },
    Unmap {
        addr: AddrRef,
        len: usize,
        #[serde(default)]
        expect: Expect,
    },
    Protect {
        addr: AddrRef,
        len: usize,
        prot: i32,
        #[serde(default)]
        expect: Expect,
    },
}

/// A sequence of mapping steps against a fresh arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapScenario {
    pub name: String,
    pub arena_pages: usize,
    pub steps: Vec<MapStep>,
    #[serde(default = "default_mode")]
    pub mode: String,
}

/// A fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSet {
    pub version: u32,
    #[serde(default)]
    pub format_cases: Vec<FormatCase>,
    #[serde(default)]
    pub map_scenarios: Vec<MapScenario>,
}

impl FixtureSet {
    /// Load fixture set from JSON string.
    pub fn from_json(json: &str) -> Result<Self, HarnessError> {
        let set: Self = serde_json::from_str(json)?;
        if set.version != FIXTURE_VERSION {
            return Err(HarnessError::UnsupportedVersion(set.version));
        }
        Ok(set)
    }

    /// Serialize fixture set to JSON string.
    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load fixture set from a file path.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// The fixtures shipped with the harness.
    pub fn bundled() -> Result<Self, HarnessError> {
        Self::from_json(BUNDLED_FIXTURES)
    }

    /// Total number of format cases and map scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.format_cases.len() + self.map_scenarios.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
