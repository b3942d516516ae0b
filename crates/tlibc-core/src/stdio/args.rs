//! Argument cursor: typed, forward-only access to a variadic argument list.
//!
//! Every read names the promoted C type the caller passed; the cursor cannot
//! check that the caller actually passed that type. A mismatch reinterprets
//! bits exactly as a C `va_arg` would.

use crate::stdio::printf::LengthMod;

/// Promoted C integer types an integer conversion may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntClass {
    /// `int` (also carries promoted `char`/`short`).
    Int,
    Long,
    LongLong,
    IntMax,
    Size,
    PtrDiff,
}

/// Forward-only reader over one call's variadic arguments.
pub trait ArgumentCursor {
    /// Next integer argument of promoted type `class`, sign-extended to 64
    /// bits.
    fn next_int(&mut self, class: IntClass) -> i64;

    /// Next `double` argument.
    fn next_double(&mut self) -> f64;

    /// Next pointer argument as an address.
    fn next_pointer(&mut self) -> usize;

    /// Next `const char *` argument. `None` for a null pointer. The returned
    /// bytes stop at the terminator, or after `limit` bytes if that comes
    /// first (a precision-limited `%s` need not be terminated).
    fn next_str(&mut self, limit: Option<usize>) -> Option<&[u8]>;

    /// Next `const wchar_t *` argument (`%ls`), one code unit per element.
    /// `None` for a null pointer. Stops at the terminator, or after `limit`
    /// units if that comes first.
    fn next_wide_str(&mut self, limit: Option<usize>) -> Option<&[u32]>;

    /// Consume the next pointer argument and store `written` through it at
    /// the width `length` names (`%n`).
    fn store_count(&mut self, length: LengthMod, written: usize);
}

/// One argument of an [`ArgList`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Double(f64),
    Ptr(usize),
    /// `None` models a null `char *`.
    Str(Option<&'a [u8]>),
    /// `None` models a null `wchar_t *`.
    WideStr(Option<&'a [u32]>),
    /// Target of a `%n` conversion; the stored value is recorded in the list.
    Count,
}

impl Arg<'_> {
    fn bits(self) -> u64 {
        match self {
            Self::Int(v) => v as u64,
            Self::Uint(v) => v,
            Self::Double(v) => v.to_bits(),
            Self::Ptr(p) => p as u64,
            Self::Str(Some(s)) => s.as_ptr() as u64,
            Self::WideStr(Some(s)) => s.as_ptr() as u64,
            Self::Str(None) | Self::WideStr(None) | Self::Count => 0,
        }
    }
}

/// Slice-backed cursor for Rust callers, tests and the conformance harness.
///
/// Reading past the end yields zero values and a null string.
#[derive(Debug, Clone)]
pub struct ArgList<'a> {
    args: Vec<Arg<'a>>,
    pos: usize,
    counts: Vec<i64>,
}

impl<'a> ArgList<'a> {
    #[must_use]
    pub fn new(args: &[Arg<'a>]) -> Self {
        Self {
            args: args.to_vec(),
            pos: 0,
            counts: Vec::new(),
        }
    }

    /// Arguments consumed so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Values stored by `%n` conversions, in order, narrowed to the target
    /// type.
    #[must_use]
    pub fn counts(&self) -> &[i64] {
        &self.counts
    }

    fn take(&mut self) -> Option<Arg<'a>> {
        let arg = self.args.get(self.pos).copied()?;
        self.pos += 1;
        Some(arg)
    }
}

impl ArgumentCursor for ArgList<'_> {
    fn next_int(&mut self, class: IntClass) -> i64 {
        let bits = self.take().map_or(0, Arg::bits);
        match class {
            IntClass::Int => bits as i32 as i64,
            _ => bits as i64,
        }
    }

    fn next_double(&mut self) -> f64 {
        f64::from_bits(self.take().map_or(0, Arg::bits))
    }

    fn next_pointer(&mut self) -> usize {
        self.take().map_or(0, Arg::bits) as usize
    }

    fn next_str(&mut self, limit: Option<usize>) -> Option<&[u8]> {
        let Some(Arg::Str(Some(bytes))) = self.take() else {
            return None;
        };
        let scan = limit.map_or(bytes, |n| &bytes[..n.min(bytes.len())]);
        let end = scan.iter().position(|&b| b == 0).unwrap_or(scan.len());
        Some(&scan[..end])
    }

    fn next_wide_str(&mut self, limit: Option<usize>) -> Option<&[u32]> {
        let Some(Arg::WideStr(Some(units))) = self.take() else {
            return None;
        };
        let scan = limit.map_or(units, |n| &units[..n.min(units.len())]);
        let end = scan.iter().position(|&u| u == 0).unwrap_or(scan.len());
        Some(&scan[..end])
    }

    fn store_count(&mut self, length: LengthMod, written: usize) {
        if self.take().is_some() {
            self.counts.push(length.narrow_signed(written as i64));
        }
    }
}
