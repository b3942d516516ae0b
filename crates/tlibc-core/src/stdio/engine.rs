//! Formatting engine: drives the parser, the cursor and the renderers into
//! one sink.

use crate::config::{SafetyLevel, safety_level};
use crate::error::FormatError;
use crate::metrics::{RuntimeMetrics, metrics};
use crate::stdio::args::{ArgumentCursor, IntClass};
use crate::stdio::printf::{
    ConversionKind, ConversionSpec, Directive, Directives, LengthMod, Precision, Width,
    render_char, render_float, render_null_str, render_pointer, render_signed, render_str,
    render_unsigned, render_wide_char, render_wide_str,
};
use crate::stdio::sink::{BoundedSink, GrowableSink, Sink, SinkSummary};

/// Format `fmt` into `sink`, pulling values from `args`.
///
/// Returns the number of bytes pushed (`wanted`). On error rendering stops at
/// once; bytes already pushed stay pushed and the sink is not finished.
pub fn vformat<C, S>(
    fmt: &[u8],
    args: &mut C,
    sink: &mut S,
    level: SafetyLevel,
) -> Result<usize, FormatError>
where
    C: ArgumentCursor + ?Sized,
    S: Sink,
{
    RuntimeMetrics::inc(&metrics().format_calls);
    let result = drive(fmt, args, sink, level);
    if result.is_err() {
        RuntimeMetrics::inc(&metrics().format_failures);
    }
    result
}

fn drive<C, S>(
    fmt: &[u8],
    args: &mut C,
    sink: &mut S,
    level: SafetyLevel,
) -> Result<usize, FormatError>
where
    C: ArgumentCursor + ?Sized,
    S: Sink,
{
    for directive in Directives::new(fmt) {
        match directive? {
            Directive::Literal(bytes) => sink.push(bytes),
            Directive::Conversion(spec) => {
                let spec = resolve_star_args(spec, args);
                render_conversion(&spec, args, sink, level)?;
            }
        }
    }
    Ok(sink.wanted())
}

/// Replace `*` width/precision with values read from the cursor. A negative
/// width left-justifies; a negative precision means none.
fn resolve_star_args<C: ArgumentCursor + ?Sized>(
    mut spec: ConversionSpec,
    args: &mut C,
) -> ConversionSpec {
    if spec.width == Width::FromArg {
        let w = args.next_int(IntClass::Int) as i32;
        if w < 0 {
            spec.flags.left_justify = true;
            spec.flags.zero_pad = false;
        }
        spec.width = Width::Fixed(w.unsigned_abs() as usize);
    }
    if spec.precision == Precision::FromArg {
        let p = args.next_int(IntClass::Int) as i32;
        spec.precision = if p < 0 {
            Precision::None
        } else {
            Precision::Fixed(p as usize)
        };
    }
    spec
}

fn render_conversion<C, S>(
    spec: &ConversionSpec,
    args: &mut C,
    sink: &mut S,
    level: SafetyLevel,
) -> Result<(), FormatError>
where
    C: ArgumentCursor + ?Sized,
    S: Sink,
{
    match spec.kind {
        ConversionKind::Signed => {
            let raw = args.next_int(spec.length.int_class());
            render_signed(spec.length.narrow_signed(raw), spec, sink);
        }
        ConversionKind::Unsigned | ConversionKind::Octal | ConversionKind::Hex => {
            let raw = args.next_int(spec.length.int_class());
            render_unsigned(spec.length.narrow_unsigned(raw), spec, sink);
        }
        ConversionKind::Pointer => render_pointer(args.next_pointer(), spec, sink),
        ConversionKind::String => {
            let limit = match spec.precision {
                Precision::Fixed(p) => Some(p),
                _ => None,
            };
            if matches!(spec.length, LengthMod::L | LengthMod::Ll) {
                // Every code unit encodes to at least one byte.
                match args.next_wide_str(limit) {
                    Some(units) => render_wide_str(units, spec, sink)?,
                    None => render_null_str(spec, sink),
                }
            } else {
                match args.next_str(limit) {
                    Some(bytes) => render_str(bytes, spec, sink),
                    None => render_null_str(spec, sink),
                }
            }
        }
        ConversionKind::Char => {
            let raw = args.next_int(IntClass::Int);
            if spec.length == LengthMod::L {
                render_wide_char(raw as u32, spec, sink)?;
            } else {
                render_char(raw as u8, spec, sink);
            }
        }
        ConversionKind::Percent => sink.push(b"%"),
        ConversionKind::Float => render_float(args.next_double(), spec, sink),
        ConversionKind::WrittenCount => {
            if level.heals_enabled() {
                let _ = args.next_pointer();
                RuntimeMetrics::inc(&metrics().sanitized);
            } else {
                args.store_count(spec.length, sink.wanted());
            }
        }
    }
    Ok(())
}

/// Convert a `wanted` count into the C `int` return value.
pub fn checked_c_int(wanted: usize) -> Result<i32, FormatError> {
    i32::try_from(wanted).map_err(|_| FormatError::Overflow { wanted })
}

/// Format into a fresh heap buffer (no terminator), with the process safety
/// level.
pub fn format_to_vec<C>(fmt: &[u8], args: &mut C) -> Result<Vec<u8>, FormatError>
where
    C: ArgumentCursor + ?Sized,
{
    let mut sink = GrowableSink::new();
    vformat(fmt, args, &mut sink, safety_level())?;
    Ok(sink.finish()?.into_vec())
}

/// `snprintf` over a Rust slice.
pub fn format_bounded<C>(
    buf: &mut [u8],
    fmt: &[u8],
    args: &mut C,
) -> Result<SinkSummary, FormatError>
where
    C: ArgumentCursor + ?Sized,
{
    let mut sink = BoundedSink::new(buf);
    vformat(fmt, args, &mut sink, safety_level())?;
    sink.finish()
}
