#![feature(c_variadic)]
// Every export takes raw pointers from C callers; the contract is the C
// standard's, so per-function safety sections would only restate it.
#![allow(clippy::missing_safety_doc)]
//! # tlibc-abi
//!
//! `extern "C"` boundary of tlibc. Produces a `cdylib` exposing the printf
//! family, anonymous `mmap`/`munmap` and `__errno_location`, each a thin
//! adapter over the safe implementations in `tlibc-core`.
//!
//! ```text
//! C caller -> ABI entry (this crate) -> va_list cursor / arena lock -> core -> errno + sentinel
//! ```
//!
//! Symbols carry `#[no_mangle]` only in release builds, so debug test
//! binaries keep the host libc's `printf`/`mmap` and call these functions
//! through their Rust paths instead.

#[macro_use]
mod macros;

pub mod console;
pub mod errno_abi;
pub mod mmap_abi;
pub mod stdio_abi;
pub mod va;

mod util;
