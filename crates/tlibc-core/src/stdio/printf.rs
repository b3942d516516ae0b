//! printf format parser and conversion renderer.
//!
//! The parser turns a format string into a lazy stream of [`Directive`]s. The
//! renderers turn one conversion plus one already-extracted value into bytes
//! pushed straight into a [`Sink`]; nothing is buffered per conversion except
//! the digit scratch for integers and the text of a float.
//!
//! Reference: ISO C11 7.21.6.1 (fprintf), POSIX.1-2024 fprintf.

use core::ffi::{c_long, c_ulong};

use crate::error::FormatError;
use crate::stdio::args::IntClass;
use crate::stdio::sink::Sink;

// ---------------------------------------------------------------------------
// Directive types
// ---------------------------------------------------------------------------

/// Flags parsed from a conversion specification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatFlags {
    pub left_justify: bool, // '-'
    pub force_sign: bool,   // '+'
    pub space_sign: bool,   // ' '
    pub alt_form: bool,     // '#'
    pub zero_pad: bool,     // '0'
}

/// Field width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    None,
    Fixed(usize),
    FromArg, // '*'
}

/// Precision. A bare `.` parses as `Fixed(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    None,
    Fixed(usize),
    FromArg, // '.*'
}

/// Length modifier. `q` parses as `Ll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthMod {
    #[default]
    None,
    Hh,   // 'hh'
    H,    // 'h'
    L,    // 'l'
    Ll,   // 'll', 'q'
    Z,    // 'z'
    T,    // 't'
    J,    // 'j'
    BigL, // 'L'
}

impl LengthMod {
    /// Promoted C type an integer argument with this modifier occupies in
    /// the variadic area.
    #[must_use]
    pub const fn int_class(self) -> IntClass {
        match self {
            Self::None | Self::Hh | Self::H => IntClass::Int,
            Self::L => IntClass::Long,
            Self::Ll | Self::BigL => IntClass::LongLong,
            Self::J => IntClass::IntMax,
            Self::Z => IntClass::Size,
            Self::T => IntClass::PtrDiff,
        }
    }

    /// Narrow a promoted argument to the signed type this modifier names.
    #[must_use]
    pub const fn narrow_signed(self, raw: i64) -> i64 {
        match self {
            Self::Hh => raw as i8 as i64,
            Self::H => raw as i16 as i64,
            Self::None => raw as i32 as i64,
            Self::L => raw as c_long as i64,
            Self::Z | Self::T => raw as isize as i64,
            Self::Ll | Self::BigL | Self::J => raw,
        }
    }

    /// Narrow a promoted argument to the unsigned type this modifier names.
    #[must_use]
    pub const fn narrow_unsigned(self, raw: i64) -> u64 {
        match self {
            Self::Hh => raw as u8 as u64,
            Self::H => raw as u16 as u64,
            Self::None => raw as u32 as u64,
            Self::L => raw as c_ulong as u64,
            Self::Z | Self::T => raw as usize as u64,
            Self::Ll | Self::BigL | Self::J => raw as u64,
        }
    }
}

/// What a conversion character asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    Signed,       // d i
    Unsigned,     // u
    Octal,        // o
    Hex,          // x X
    Pointer,      // p
    String,       // s
    Char,         // c
    Percent,      // %
    Float,        // f F e E g G
    WrittenCount, // n
}

impl ConversionKind {
    #[must_use]
    pub const fn from_byte(c: u8) -> Option<Self> {
        Some(match c {
            b'd' | b'i' => Self::Signed,
            b'u' => Self::Unsigned,
            b'o' => Self::Octal,
            b'x' | b'X' => Self::Hex,
            b'p' => Self::Pointer,
            b's' => Self::String,
            b'c' => Self::Char,
            b'%' => Self::Percent,
            b'f' | b'F' | b'e' | b'E' | b'g' | b'G' => Self::Float,
            b'n' => Self::WrittenCount,
            _ => return None,
        })
    }
}

/// One parsed `%...` conversion specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSpec {
    pub flags: FormatFlags,
    pub width: Width,
    pub precision: Precision,
    pub length: LengthMod,
    pub kind: ConversionKind,
    /// The conversion character itself (case selects hex/float spelling).
    pub conversion: u8,
}

impl ConversionSpec {
    fn uppercase(&self) -> bool {
        self.conversion.is_ascii_uppercase()
    }

    fn field_width(&self) -> usize {
        match self.width {
            Width::Fixed(w) => w,
            _ => 0,
        }
    }

    fn fixed_precision(&self) -> Option<usize> {
        match self.precision {
            Precision::Fixed(p) => Some(p),
            _ => None,
        }
    }
}

/// One unit of a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// Bytes to emit verbatim.
    Literal(&'a [u8]),
    Conversion(ConversionSpec),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a single conversion specification.
///
/// `fmt` starts at the first byte AFTER `%`. Returns `(spec, bytes_consumed)`
/// or `None` if no valid conversion character terminates the specification.
#[must_use]
pub fn parse_conversion_spec(fmt: &[u8]) -> Option<(ConversionSpec, usize)> {
    let mut pos = 0;
    let at = |pos: usize| fmt.get(pos).copied().unwrap_or(0);

    let mut flags = FormatFlags::default();
    loop {
        match at(pos) {
            b'-' => flags.left_justify = true,
            b'+' => flags.force_sign = true,
            b' ' => flags.space_sign = true,
            b'#' => flags.alt_form = true,
            b'0' => flags.zero_pad = true,
            _ => break,
        }
        pos += 1;
    }
    if flags.force_sign {
        flags.space_sign = false;
    }
    if flags.left_justify {
        flags.zero_pad = false;
    }

    let width = if at(pos) == b'*' {
        pos += 1;
        Width::FromArg
    } else {
        let (value, digits) = parse_decimal(&fmt[pos..]);
        pos += digits;
        if digits > 0 {
            Width::Fixed(value)
        } else {
            Width::None
        }
    };

    let precision = if at(pos) == b'.' {
        pos += 1;
        if at(pos) == b'*' {
            pos += 1;
            Precision::FromArg
        } else {
            let (value, digits) = parse_decimal(&fmt[pos..]);
            pos += digits;
            Precision::Fixed(value)
        }
    } else {
        Precision::None
    };

    let length = match (at(pos), at(pos + 1)) {
        (b'h', b'h') => {
            pos += 2;
            LengthMod::Hh
        }
        (b'l', b'l') => {
            pos += 2;
            LengthMod::Ll
        }
        (b'h', _) => {
            pos += 1;
            LengthMod::H
        }
        (b'l', _) => {
            pos += 1;
            LengthMod::L
        }
        (b'q', _) => {
            pos += 1;
            LengthMod::Ll
        }
        (b'L', _) => {
            pos += 1;
            LengthMod::BigL
        }
        (b'j', _) => {
            pos += 1;
            LengthMod::J
        }
        (b'z', _) => {
            pos += 1;
            LengthMod::Z
        }
        (b't', _) => {
            pos += 1;
            LengthMod::T
        }
        _ => LengthMod::None,
    };

    let conversion = at(pos);
    let kind = ConversionKind::from_byte(conversion)?;
    pos += 1;

    Some((
        ConversionSpec {
            flags,
            width,
            precision,
            length,
            kind,
            conversion,
        },
        pos,
    ))
}

/// Lazy iterator over the directives of a format string.
///
/// Stops at the end of the slice or at the first NUL byte. After yielding an
/// error the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Directives<'a> {
    fmt: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Directives<'a> {
    #[must_use]
    pub fn new(fmt: &'a [u8]) -> Self {
        let end = fmt.iter().position(|&b| b == 0).unwrap_or(fmt.len());
        Self {
            fmt: &fmt[..end],
            pos: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for Directives<'a> {
    type Item = Result<Directive<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.fmt.len() {
            return None;
        }
        let rest = &self.fmt[self.pos..];
        if rest[0] != b'%' {
            let run = rest.iter().position(|&b| b == b'%').unwrap_or(rest.len());
            self.pos += run;
            return Some(Ok(Directive::Literal(&rest[..run])));
        }
        if rest.get(1) == Some(&b'%') {
            self.pos += 2;
            return Some(Ok(Directive::Literal(&rest[1..2])));
        }
        match parse_conversion_spec(&rest[1..]) {
            Some((spec, consumed)) => {
                self.pos += 1 + consumed;
                Some(Ok(Directive::Conversion(spec)))
            }
            None => {
                self.done = true;
                Some(Err(FormatError::MalformedFormat { offset: self.pos }))
            }
        }
    }
}

impl core::iter::FusedIterator for Directives<'_> {}

/// Parse a whole format string eagerly. Used by tests and the harness.
pub fn parse_format_string(fmt: &[u8]) -> Result<Vec<Directive<'_>>, FormatError> {
    Directives::new(fmt).collect()
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------
//
// Each renderer expects a spec whose width and precision have already been
// resolved: `FromArg` is treated like `None`.

/// Render a signed integer (`%d`, `%i`).
pub fn render_signed<S: Sink>(value: i64, spec: &ConversionSpec, sink: &mut S) {
    let sign = if value < 0 {
        Some(b'-')
    } else if spec.flags.force_sign {
        Some(b'+')
    } else if spec.flags.space_sign {
        Some(b' ')
    } else {
        None
    };
    render_integer(value.unsigned_abs(), sign, b"", spec, sink);
}

/// Render an unsigned integer in the base the conversion selects (`%u`,
/// `%o`, `%x`, `%X`).
pub fn render_unsigned<S: Sink>(value: u64, spec: &ConversionSpec, sink: &mut S) {
    let prefix: &[u8] = match (spec.flags.alt_form && value != 0, spec.conversion) {
        (true, b'x') => b"0x",
        (true, b'X') => b"0X",
        _ => b"",
    };
    render_integer(value, None, prefix, spec, sink);
}

/// Text emitted for a `%p` whose argument is a null pointer.
pub const NULL_PTR: &[u8] = b"(nil)";

/// Render a pointer (`%p`) as `0x` plus lowercase hex. Zero padding applies
/// as for `%#x`. A null pointer renders [`NULL_PTR`], space-padded only.
pub fn render_pointer<S: Sink>(addr: usize, spec: &ConversionSpec, sink: &mut S) {
    if addr == 0 {
        render_padded(NULL_PTR, spec, sink);
        return;
    }
    let mut hex = *spec;
    hex.conversion = b'x';
    hex.kind = ConversionKind::Hex;
    render_integer(addr as u64, None, b"0x", &hex, sink);
}

fn render_integer<S: Sink>(
    value: u64,
    sign: Option<u8>,
    prefix: &[u8],
    spec: &ConversionSpec,
    sink: &mut S,
) {
    let base = match spec.kind {
        ConversionKind::Octal => 8,
        ConversionKind::Hex => 16,
        _ => 10,
    };
    let mut scratch = [0u8; 64];
    let count = render_digits(value, base, spec.uppercase(), &mut scratch);
    let mut digits = &scratch[64 - count..];

    let precision = spec.fixed_precision();
    if value == 0 && precision == Some(0) {
        digits = b"";
    }
    let mut leading_zeros = precision.unwrap_or(1).saturating_sub(digits.len());
    if spec.kind == ConversionKind::Octal
        && spec.flags.alt_form
        && leading_zeros == 0
        && digits.first() != Some(&b'0')
    {
        leading_zeros = 1;
    }

    let content = usize::from(sign.is_some()) + prefix.len() + leading_zeros + digits.len();
    let pad_total = spec.field_width().saturating_sub(content);
    // An explicit precision turns off the '0' flag for integers.
    let zero_fill = spec.flags.zero_pad && precision.is_none();

    if !spec.flags.left_justify && !zero_fill {
        sink.push_repeat(b' ', pad_total);
    }
    if let Some(s) = sign {
        sink.push(&[s]);
    }
    sink.push(prefix);
    if zero_fill {
        sink.push_repeat(b'0', pad_total);
    }
    sink.push_repeat(b'0', leading_zeros);
    sink.push(digits);
    if spec.flags.left_justify {
        sink.push_repeat(b' ', pad_total);
    }
}

/// Render `%s`. `bytes` is already cut at its terminator; precision caps the
/// number of bytes copied.
pub fn render_str<S: Sink>(bytes: &[u8], spec: &ConversionSpec, sink: &mut S) {
    let take = spec.fixed_precision().map_or(bytes.len(), |p| p.min(bytes.len()));
    render_padded(&bytes[..take], spec, sink);
}

/// Text emitted for a `%s` whose argument is a null pointer.
pub const NULL_STR: &[u8] = b"(null)";

/// Render `%s` for a null pointer. Width applies, precision does not.
pub fn render_null_str<S: Sink>(spec: &ConversionSpec, sink: &mut S) {
    render_padded(NULL_STR, spec, sink);
}

/// Render `%c`.
pub fn render_char<S: Sink>(byte: u8, spec: &ConversionSpec, sink: &mut S) {
    render_padded(&[byte], spec, sink);
}

/// Render `%lc` as UTF-8.
pub fn render_wide_char<S: Sink>(
    value: u32,
    spec: &ConversionSpec,
    sink: &mut S,
) -> Result<(), FormatError> {
    let c = char::from_u32(value).ok_or(FormatError::InvalidWideChar { value })?;
    let mut utf8 = [0u8; 4];
    render_padded(c.encode_utf8(&mut utf8).as_bytes(), spec, sink);
    Ok(())
}

/// Render `%ls`: each code unit as UTF-8. Precision caps the output in bytes
/// and never splits a character.
pub fn render_wide_str<S: Sink>(
    units: &[u32],
    spec: &ConversionSpec,
    sink: &mut S,
) -> Result<(), FormatError> {
    let budget = spec.fixed_precision().unwrap_or(usize::MAX);
    let mut len = 0_usize;
    let mut take = 0;
    for &unit in units {
        let c = char::from_u32(unit).ok_or(FormatError::InvalidWideChar { value: unit })?;
        if c.len_utf8() > budget - len {
            break;
        }
        len += c.len_utf8();
        take += 1;
    }

    let pad_total = spec.field_width().saturating_sub(len);
    if !spec.flags.left_justify {
        sink.push_repeat(b' ', pad_total);
    }
    let mut utf8 = [0u8; 4];
    for c in units[..take].iter().filter_map(|&u| char::from_u32(u)) {
        sink.push(c.encode_utf8(&mut utf8).as_bytes());
    }
    if spec.flags.left_justify {
        sink.push_repeat(b' ', pad_total);
    }
    Ok(())
}

fn render_padded<S: Sink>(content: &[u8], spec: &ConversionSpec, sink: &mut S) {
    let pad_total = spec.field_width().saturating_sub(content.len());
    if !spec.flags.left_justify {
        sink.push_repeat(b' ', pad_total);
    }
    sink.push(content);
    if spec.flags.left_justify {
        sink.push_repeat(b' ', pad_total);
    }
}

/// Render a floating-point value (`%f %F %e %E %g %G`).
pub fn render_float<S: Sink>(value: f64, spec: &ConversionSpec, sink: &mut S) {
    let upper = spec.uppercase();
    let sign = if value.is_sign_negative() && !value.is_nan() {
        Some(b'-')
    } else if spec.flags.force_sign {
        Some(b'+')
    } else if spec.flags.space_sign {
        Some(b' ')
    } else {
        None
    };

    if !value.is_finite() {
        let word: &[u8] = match (value.is_nan(), upper) {
            (true, false) => b"nan",
            (true, true) => b"NAN",
            (false, false) => b"inf",
            (false, true) => b"INF",
        };
        let content = usize::from(sign.is_some()) + word.len();
        let pad_total = spec.field_width().saturating_sub(content);
        if !spec.flags.left_justify {
            sink.push_repeat(b' ', pad_total);
        }
        if let Some(s) = sign {
            sink.push(&[s]);
        }
        sink.push(word);
        if spec.flags.left_justify {
            sink.push_repeat(b' ', pad_total);
        }
        return;
    }

    let precision = spec.fixed_precision().unwrap_or(6);
    let abs = value.abs();
    let alt = spec.flags.alt_form;
    let body = match spec.conversion | 0x20 {
        b'e' => format_e(abs, precision, upper, alt),
        b'g' => format_g(abs, precision, upper, alt),
        _ => format_f(abs, precision, alt),
    };

    let content = usize::from(sign.is_some()).saturating_add(body.len());
    let pad_total = spec.field_width().saturating_sub(content);
    if !spec.flags.left_justify && !spec.flags.zero_pad {
        sink.push_repeat(b' ', pad_total);
    }
    if let Some(s) = sign {
        sink.push(&[s]);
    }
    if !spec.flags.left_justify && spec.flags.zero_pad {
        sink.push_repeat(b'0', pad_total);
    }
    sink.push(body.digits.as_bytes());
    sink.push_repeat(b'0', body.zeros);
    sink.push(body.suffix.as_bytes());
    if spec.flags.left_justify {
        sink.push_repeat(b' ', pad_total);
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Returns `(value, digits_consumed)`; saturates on overflow.
fn parse_decimal(bytes: &[u8]) -> (usize, usize) {
    let mut value = 0_usize;
    let mut count = 0;
    for &d in bytes.iter().take_while(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add(usize::from(d - b'0'));
        count += 1;
    }
    (value, count)
}

/// Render `value` in `base` right-aligned into `buf`; returns the digit count.
fn render_digits(mut value: u64, base: u64, uppercase: bool, buf: &mut [u8; 64]) -> usize {
    if value == 0 {
        buf[63] = b'0';
        return 1;
    }
    let alpha = if uppercase { b'A' } else { b'a' };
    let mut pos = 64;
    while value > 0 {
        pos -= 1;
        let digit = (value % base) as u8;
        buf[pos] = if digit < 10 {
            b'0' + digit
        } else {
            alpha + (digit - 10)
        };
        value /= base;
    }
    64 - pos
}

/// Largest precision handed to `core::fmt`, which rejects anything wider.
/// Every `f64` has at most 1074 fraction digits and 767 significant ones, so
/// digits requested beyond this are exact zeros.
const FMT_PRECISION_MAX: usize = u16::MAX as usize;

/// Float text without sign or padding: `digits`, then `zeros` literal zeros,
/// then `suffix` (the exponent, if any).
struct FloatBody {
    digits: String,
    zeros: usize,
    suffix: String,
}

impl FloatBody {
    fn len(&self) -> usize {
        self.digits
            .len()
            .saturating_add(self.zeros)
            .saturating_add(self.suffix.len())
    }
}

/// `%f`: fixed-point decimal.
fn format_f(value: f64, precision: usize, alt_form: bool) -> FloatBody {
    let shown = precision.min(FMT_PRECISION_MAX);
    let mut digits = format!("{value:.shown$}");
    if precision == 0 && alt_form {
        digits.push('.');
    }
    FloatBody {
        digits,
        zeros: precision - shown,
        suffix: String::new(),
    }
}

/// `%e`: one leading digit, `precision` fraction digits, signed exponent of
/// at least two digits.
fn format_e(value: f64, precision: usize, uppercase: bool, alt_form: bool) -> FloatBody {
    let shown = precision.min(FMT_PRECISION_MAX);
    let (mut digits, exp) = split_exponent(value, shown);
    if precision == 0 && alt_form {
        digits.push('.');
    }
    let mut suffix = String::new();
    push_exponent(&mut suffix, exp, uppercase);
    FloatBody {
        digits,
        zeros: precision - shown,
        suffix,
    }
}

/// `%g`: `%e` when the exponent is below -4 or at least the precision,
/// otherwise `%f`; trailing zeros dropped unless `#`.
fn format_g(value: f64, precision: usize, uppercase: bool, alt_form: bool) -> FloatBody {
    let p = precision.max(1);
    let (mut mantissa, exp) = split_exponent(value, (p - 1).min(FMT_PRECISION_MAX));
    let fixed = exp >= -4 && usize::try_from(exp).map_or(true, |e| e < p);
    if fixed {
        let frac = match usize::try_from(exp) {
            Ok(e) => p - 1 - e,
            Err(_) => (p - 1).saturating_add(exp.unsigned_abs() as usize),
        };
        let shown = frac.min(FMT_PRECISION_MAX);
        let mut digits = format!("{value:.shown$}");
        let zeros = if alt_form {
            if !digits.contains('.') {
                digits.push('.');
            }
            frac - shown
        } else {
            strip_trailing_zeros(&mut digits);
            0
        };
        FloatBody {
            digits,
            zeros,
            suffix: String::new(),
        }
    } else {
        let zeros = if alt_form {
            if !mantissa.contains('.') {
                mantissa.push('.');
            }
            (p - 1) - (p - 1).min(FMT_PRECISION_MAX)
        } else {
            strip_trailing_zeros(&mut mantissa);
            0
        };
        let mut suffix = String::new();
        push_exponent(&mut suffix, exp, uppercase);
        FloatBody {
            digits: mantissa,
            zeros,
            suffix,
        }
    }
}

/// Scientific rendering split into mantissa text and the decimal exponent
/// after rounding to `precision` fraction digits. `precision` must not exceed
/// [`FMT_PRECISION_MAX`].
fn split_exponent(value: f64, precision: usize) -> (String, i32) {
    let text = format!("{value:.precision$e}");
    match text.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_owned(), exp.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

fn push_exponent(s: &mut String, exp: i32, uppercase: bool) {
    s.push(if uppercase { 'E' } else { 'e' });
    s.push(if exp < 0 { '-' } else { '+' });
    let magnitude = exp.unsigned_abs();
    if magnitude < 10 {
        s.push('0');
    }
    s.push_str(&magnitude.to_string());
}

/// Remove trailing zeros after the decimal point, and the point itself if
/// nothing follows it.
fn strip_trailing_zeros(s: &mut String) {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
