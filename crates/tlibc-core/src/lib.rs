//! # tlibc-core
//!
//! Safe Rust core of tlibc, a freestanding C runtime for bare-metal targets,
//! custom kernels and instrumented test harnesses.
//!
//! Two subsystems live here:
//!
//! - [`stdio`]: the formatted-output engine behind `printf`, `snprintf`,
//!   `sprintf` and `asprintf`. A lazy format parser feeds directives to a
//!   conversion renderer that pulls typed values from an [`stdio::ArgumentCursor`]
//!   and pushes bytes into one of three [`stdio::Sink`] disciplines.
//! - [`mmap`]: the anonymous memory-region manager behind `mmap`/`munmap`,
//!   carving page-aligned regions out of a backing arena.
//!
//! No `unsafe` code is permitted at the crate level; raw pointers, `va_list`
//! handling and symbol export live in `tlibc-abi`.

#![deny(unsafe_code)]

pub mod config;
pub mod errno;
pub mod error;
pub mod metrics;
pub mod mmap;
pub mod stdio;

pub use error::{FormatError, MapError};
