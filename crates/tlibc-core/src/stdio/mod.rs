//! Formatted output.
//!
//! `printf`, `snprintf`/`sprintf` and `asprintf` share one engine and differ
//! only in the [`Sink`] they install:
//!
//! | entry point | sink |
//! |---|---|
//! | `printf` | [`UnboundedSink`] over an [`OutputChannel`] |
//! | `snprintf` | [`BoundedSink`] |
//! | `asprintf` | [`GrowableSink`] |

pub mod args;
pub mod engine;
pub mod printf;
pub mod sink;

pub use args::{Arg, ArgList, ArgumentCursor, IntClass};
pub use engine::{checked_c_int, format_bounded, format_to_vec, vformat};
pub use printf::{
    ConversionKind, ConversionSpec, Directive, Directives, FormatFlags, LengthMod, Precision,
    Width, parse_conversion_spec, parse_format_string,
};
pub use sink::{
    BoundedSink, GrowStore, GrowableSink, GrownBuffer, OutputChannel, STAGING_BYTES, Sink,
    SinkSummary, UnboundedSink,
};
