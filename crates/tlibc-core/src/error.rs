//! Error taxonomy for the formatting engine and the region manager.
//!
//! Every failure is surfaced synchronously; nothing is retried. The ABI layer
//! turns these into the C sentinels (`-1`, `MAP_FAILED`) plus `errno`.

use thiserror::Error;

use crate::errno::{EEXIST, EILSEQ, EINVAL, ENODEV, ENOMEM, EOVERFLOW};

/// Failures of a single formatting call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A `%` at byte `offset` is not followed by a valid conversion.
    #[error("malformed conversion at byte {offset}")]
    MalformedFormat { offset: usize },
    /// The growable sink could not grow to `requested` bytes.
    #[error("output buffer could not grow to {requested} bytes")]
    AllocationFailed { requested: usize },
    /// `%lc` received a value that is not a Unicode scalar value.
    #[error("invalid wide character {value:#x}")]
    InvalidWideChar { value: u32 },
    /// The output length does not fit the C `int` return value.
    #[error("formatted length {wanted} exceeds INT_MAX")]
    Overflow { wanted: usize },
}

impl FormatError {
    /// errno value reported by the C entry points.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::MalformedFormat { .. } => EINVAL,
            Self::AllocationFailed { .. } => ENOMEM,
            Self::InvalidWideChar { .. } => EILSEQ,
            Self::Overflow { .. } => EOVERFLOW,
        }
    }
}

/// Failures of `mmap`/`munmap`/`mprotect` requests. The region table is
/// unchanged whenever one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("mapping length is zero or overflows")]
    InvalidLength,
    #[error("range is misaligned, outside the arena, or not mapped")]
    InvalidRange,
    #[error("unknown or contradictory PROT_*/MAP_* flags")]
    InvalidFlags,
    #[error("fixed-no-replace range overlaps an existing mapping")]
    AddressInUse,
    #[error("no free range large enough in the arena")]
    NoSpace,
    #[error("only anonymous mappings are supported")]
    Unsupported,
    #[error("range contains unmapped pages")]
    NotMapped,
}

impl MapError {
    /// errno value reported by the C entry points.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidLength | Self::InvalidRange | Self::InvalidFlags => EINVAL,
            Self::AddressInUse => EEXIST,
            Self::NoSpace | Self::NotMapped => ENOMEM,
            Self::Unsupported => ENODEV,
        }
    }
}
