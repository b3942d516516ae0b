//! `va_list`-backed argument cursor.
//!
//! The engine in `tlibc-core` reads arguments through
//! [`ArgumentCursor`]; this adapter answers each read with one `va_arg` of
//! the matching promoted type, pulled through a closure built by
//! `va_pull!`.

use std::ffi::{c_char, c_int, c_long};

use tlibc_core::stdio::{ArgumentCursor, IntClass, LengthMod};

use crate::util::{scan_c_string, scan_wide_string};

/// Promoted C type of one `va_arg` read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSlot {
    Int,
    Long,
    LongLong,
    Size,
    Double,
    Pointer,
}

/// Value of one `va_arg` read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgWord {
    Int(i64),
    Double(f64),
    Pointer(usize),
}

impl ArgWord {
    fn as_int(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::Double(d) => d.to_bits() as i64,
            Self::Pointer(p) => p as i64,
        }
    }
}

/// Cursor over one call's variadic arguments.
pub struct VaCursor<F> {
    pull: F,
}

impl<F> VaCursor<F>
where
    F: FnMut(ArgSlot) -> ArgWord,
{
    /// # Safety
    ///
    /// Every pointer `pull` yields for a `%s`, `%ls` or `%n` conversion must be null
    /// or valid for the access that conversion makes, for as long as the
    /// cursor lives.
    pub unsafe fn new(pull: F) -> Self {
        Self { pull }
    }

    fn pointer(&mut self) -> usize {
        match (self.pull)(ArgSlot::Pointer) {
            ArgWord::Pointer(p) => p,
            other => other.as_int() as usize,
        }
    }
}

impl<F> ArgumentCursor for VaCursor<F>
where
    F: FnMut(ArgSlot) -> ArgWord,
{
    fn next_int(&mut self, class: IntClass) -> i64 {
        let slot = match class {
            IntClass::Int => ArgSlot::Int,
            IntClass::Long => ArgSlot::Long,
            IntClass::LongLong | IntClass::IntMax => ArgSlot::LongLong,
            IntClass::Size | IntClass::PtrDiff => ArgSlot::Size,
        };
        (self.pull)(slot).as_int()
    }

    fn next_double(&mut self) -> f64 {
        match (self.pull)(ArgSlot::Double) {
            ArgWord::Double(d) => d,
            other => f64::from_bits(other.as_int() as u64),
        }
    }

    fn next_pointer(&mut self) -> usize {
        self.pointer()
    }

    fn next_str(&mut self, limit: Option<usize>) -> Option<&[u8]> {
        let ptr = self.pointer() as *const c_char;
        if ptr.is_null() {
            return None;
        }
        // SAFETY: guaranteed by the contract of `VaCursor::new`.
        unsafe {
            let len = scan_c_string(ptr, limit);
            Some(std::slice::from_raw_parts(ptr.cast::<u8>(), len))
        }
    }

    fn next_wide_str(&mut self, limit: Option<usize>) -> Option<&[u32]> {
        let ptr = self.pointer() as *const libc::wchar_t;
        if ptr.is_null() {
            return None;
        }
        // SAFETY: guaranteed by the contract of `VaCursor::new`; `wchar_t`
        // is a 32-bit code unit on every supported target.
        unsafe {
            let len = scan_wide_string(ptr, limit);
            Some(std::slice::from_raw_parts(ptr.cast::<u32>(), len))
        }
    }

    fn store_count(&mut self, length: LengthMod, written: usize) {
        let target = self.pointer();
        if target == 0 {
            return;
        }
        let value = length.narrow_signed(written as i64);
        // SAFETY: guaranteed by the contract of `VaCursor::new`; the pointee
        // type is the one the length modifier names.
        unsafe {
            match length {
                LengthMod::Hh => (target as *mut i8).write_unaligned(value as i8),
                LengthMod::H => (target as *mut i16).write_unaligned(value as i16),
                LengthMod::None | LengthMod::BigL => {
                    (target as *mut c_int).write_unaligned(value as c_int)
                }
                LengthMod::L => (target as *mut c_long).write_unaligned(value as c_long),
                LengthMod::Ll | LengthMod::J => (target as *mut i64).write_unaligned(value),
                LengthMod::Z | LengthMod::T => {
                    (target as *mut isize).write_unaligned(value as isize)
                }
            }
        }
    }
}
