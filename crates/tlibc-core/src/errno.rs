//! Error number definitions.
//!
//! Only the `<errno.h>` values the formatting engine and the region manager
//! can report are defined here. Storage of the per-thread `errno` itself is an
//! ABI concern (`__errno_location` in `tlibc-abi`).

pub const EPERM: i32 = 1;
pub const ENOMEM: i32 = 12;
pub const EEXIST: i32 = 17;
pub const ENODEV: i32 = 19;
pub const EINVAL: i32 = 22;
pub const EILSEQ: i32 = 84;
pub const EOVERFLOW: i32 = 75;

/// Symbolic name for an errno value, used in harness logs.
#[must_use]
pub const fn errno_name(value: i32) -> &'static str {
    match value {
        0 => "OK",
        EPERM => "EPERM",
        ENOMEM => "ENOMEM",
        EEXIST => "EEXIST",
        ENODEV => "ENODEV",
        EINVAL => "EINVAL",
        EILSEQ => "EILSEQ",
        EOVERFLOW => "EOVERFLOW",
        _ => "EUNKNOWN",
    }
}
