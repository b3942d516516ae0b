//! Runtime configuration.
//!
//! The runtime mode is set via the `TLIBC_MODE` environment variable when an
//! environment exists, or programmatically through [`set_safety_level`] on
//! bare-metal targets:
//! - `strict` (default): POSIX-correct return/errno semantics. Invalid
//!   requests fail exactly as a conformant libc would.
//! - `hardened`: deterministic repair of dangerous requests. `%n` stores are
//!   suppressed and malformed `mmap` protection/visibility bits are clamped
//!   instead of rejected.
//!
//! The arena backing anonymous mappings is sized by `TLIBC_ARENA_BYTES`.

use std::sync::atomic::{AtomicU8, Ordering};

/// Runtime operating mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyLevel {
    /// POSIX-correct behaviour; invalid requests fail.
    #[default]
    Strict,
    /// Repair dangerous requests instead of failing or honouring them.
    Hardened,
}

impl SafetyLevel {
    /// Parse from string (case-insensitive). Unknown spellings are `Strict`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hardened" | "repair" | "safe" => Self::Hardened,
            _ => Self::Strict,
        }
    }

    /// Returns true if requests should be repaired rather than rejected.
    #[must_use]
    pub const fn heals_enabled(self) -> bool {
        matches!(self, Self::Hardened)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Hardened => "hardened",
        }
    }
}

// Atomic cache: 0=unresolved, 1=Strict, 2=Hardened, 255=resolving.
// A reentrant call that arrives while the environment is being read (the
// host's getenv may call back into our exported string/stdio symbols) sees
// RESOLVING and gets Strict instead of blocking.
static CACHED_LEVEL: AtomicU8 = AtomicU8::new(0);

const LEVEL_UNRESOLVED: u8 = 0;
const LEVEL_STRICT: u8 = 1;
const LEVEL_HARDENED: u8 = 2;
const LEVEL_RESOLVING: u8 = 255;

const fn level_to_u8(level: SafetyLevel) -> u8 {
    match level {
        SafetyLevel::Strict => LEVEL_STRICT,
        SafetyLevel::Hardened => LEVEL_HARDENED,
    }
}

const fn u8_to_level(v: u8) -> SafetyLevel {
    match v {
        LEVEL_HARDENED => SafetyLevel::Hardened,
        _ => SafetyLevel::Strict,
    }
}

/// Get the configured safety level (reads `TLIBC_MODE` on first call, caches
/// thereafter).
#[must_use]
pub fn safety_level() -> SafetyLevel {
    let cached = CACHED_LEVEL.load(Ordering::Relaxed);
    if cached != LEVEL_UNRESOLVED && cached != LEVEL_RESOLVING {
        return u8_to_level(cached);
    }
    if cached == LEVEL_RESOLVING {
        return SafetyLevel::Strict;
    }

    if CACHED_LEVEL
        .compare_exchange(
            LEVEL_UNRESOLVED,
            LEVEL_RESOLVING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        let v = CACHED_LEVEL.load(Ordering::Relaxed);
        return if v != LEVEL_UNRESOLVED && v != LEVEL_RESOLVING {
            u8_to_level(v)
        } else {
            SafetyLevel::Strict
        };
    }

    let level = std::env::var("TLIBC_MODE")
        .map(|v| SafetyLevel::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_LEVEL.store(level_to_u8(level), Ordering::Release);
    level
}

/// Override the safety level for the rest of the process.
pub fn set_safety_level(level: SafetyLevel) {
    CACHED_LEVEL.store(level_to_u8(level), Ordering::Release);
}

// ---------------------------------------------------------------------------
// Arena configuration
// ---------------------------------------------------------------------------

/// Page granularity of the region manager.
pub const PAGE_SIZE: usize = 4096;

/// Arena size used when `TLIBC_ARENA_BYTES` is unset or unparsable.
pub const DEFAULT_ARENA_BYTES: usize = 16 * 1024 * 1024;

/// Sizing of the arena that backs anonymous mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    pub page_size: usize,
    pub arena_bytes: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            arena_bytes: DEFAULT_ARENA_BYTES,
        }
    }
}

impl ArenaConfig {
    /// Build from an optional raw `TLIBC_ARENA_BYTES` value.
    ///
    /// Accepts decimal or `0x` hexadecimal; the result is rounded up to whole
    /// pages and is at least one page.
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        let page_size = PAGE_SIZE;
        let requested = raw
            .and_then(parse_size)
            .unwrap_or(DEFAULT_ARENA_BYTES)
            .max(page_size);
        let arena_bytes = requested
            .checked_next_multiple_of(page_size)
            .unwrap_or(usize::MAX - (page_size - 1));
        Self {
            page_size,
            arena_bytes,
        }
    }

    /// Read the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let raw = std::env::var("TLIBC_ARENA_BYTES").ok();
        Self::from_raw(raw.as_deref())
    }
}

fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}
