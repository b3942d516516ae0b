//! Shared internal utilities for ABI adapters.

use std::ffi::c_char;

use libc::wchar_t;

/// Length of a C string, stopping at `bound` bytes when one is given.
///
/// # Safety
///
/// `ptr` must be readable up to the terminator, or up to `bound` bytes when
/// the string may be unterminated.
pub(crate) unsafe fn scan_c_string(ptr: *const c_char, bound: Option<usize>) -> usize {
    match bound {
        Some(limit) => {
            for i in 0..limit {
                if unsafe { *ptr.add(i) } == 0 {
                    return i;
                }
            }
            limit
        }
        None => {
            let mut i = 0usize;
            while unsafe { *ptr.add(i) } != 0 {
                i += 1;
            }
            i
        }
    }
}

/// Length in code units of a NUL-terminated wide string, stopping at `bound`
/// units when one is given.
///
/// # Safety
///
/// As for [`scan_c_string`], in units of `wchar_t`.
pub(crate) unsafe fn scan_wide_string(ptr: *const wchar_t, bound: Option<usize>) -> usize {
    let limit = bound.unwrap_or(usize::MAX);
    let mut i = 0usize;
    while i < limit && unsafe { *ptr.add(i) } != 0 {
        i += 1;
    }
    i
}
