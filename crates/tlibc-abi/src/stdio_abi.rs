//! ABI layer for the `<stdio.h>` formatted-output family.
//!
//! Every entry point resolves the format, wraps its variadic list in a
//! [`VaCursor`], installs the sink its contract names and hands both to
//! [`vformat`]. Failures store errno and return -1.

use std::ffi::{CStr, VaList, c_char, c_int, c_void};
use std::ptr;

use tlibc_core::FormatError;
use tlibc_core::config::safety_level;
use tlibc_core::errno;
use tlibc_core::stdio::{
    ArgumentCursor, BoundedSink, GrowStore, GrowableSink, Sink, UnboundedSink, checked_c_int,
    vformat,
};

use crate::console::Console;
use crate::errno_abi::set_abi_errno;
use crate::va::VaCursor;

/// Format bytes of a C string, `None` for a null pointer.
unsafe fn format_bytes<'a>(format: *const c_char) -> Option<&'a [u8]> {
    if format.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(format) }.to_bytes())
    }
}

/// Map an engine result onto the C return convention.
fn c_result(result: Result<usize, FormatError>) -> c_int {
    match result.and_then(checked_c_int) {
        Ok(n) => n,
        Err(err) => {
            set_abi_errno(err.errno());
            -1
        }
    }
}

fn fail(code: c_int) -> c_int {
    set_abi_errno(code);
    -1
}

// ---------------------------------------------------------------------------
// sprintf sink
// ---------------------------------------------------------------------------

/// Unchecked destination of `sprintf`: the caller vouches for the room.
struct RawSink {
    dst: *mut u8,
    wanted: usize,
}

impl RawSink {
    /// # Safety
    ///
    /// `dst` must be writable for the whole output plus its terminator.
    unsafe fn new(dst: *mut u8) -> Self {
        Self { dst, wanted: 0 }
    }
}

impl Sink for RawSink {
    type Output = usize;

    fn push(&mut self, bytes: &[u8]) {
        // SAFETY: room is guaranteed by the contract of `RawSink::new`.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.dst.add(self.wanted), bytes.len());
        }
        self.wanted += bytes.len();
    }

    fn wanted(&self) -> usize {
        self.wanted
    }

    fn finish(self) -> Result<usize, FormatError> {
        // SAFETY: as for `push`.
        unsafe { *self.dst.add(self.wanted) = 0 };
        Ok(self.wanted)
    }
}

// ---------------------------------------------------------------------------
// asprintf store
// ---------------------------------------------------------------------------

/// `realloc`-grown buffer whose final allocation becomes the `asprintf`
/// result, so the caller can release it with `free(3)`.
struct MallocStore {
    ptr: *mut u8,
    len: usize,
    cap: usize,
}

impl MallocStore {
    const fn new() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }

    /// Give up ownership of the allocation.
    fn into_raw(self) -> *mut c_char {
        let raw = self.ptr.cast::<c_char>();
        std::mem::forget(self);
        raw
    }
}

impl GrowStore for MallocStore {
    fn filled(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.cap
    }

    fn try_grow(&mut self, capacity: usize) -> bool {
        if capacity <= self.cap {
            return true;
        }
        // SAFETY: `ptr` is null or the live allocation from the previous
        // `realloc`; on failure it stays valid.
        let grown = unsafe { libc::realloc(self.ptr.cast::<c_void>(), capacity) }.cast::<u8>();
        if grown.is_null() {
            return false;
        }
        self.ptr = grown;
        self.cap = capacity;
        true
    }

    fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        debug_assert!(self.len + bytes.len() <= self.cap);
        // SAFETY: the sink grew the allocation to fit before appending.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.add(self.len), bytes.len());
        }
        self.len += bytes.len();
    }

    fn release(&mut self) {
        // SAFETY: `ptr` is null or owned by this store.
        unsafe { libc::free(self.ptr.cast::<c_void>()) };
        self.ptr = ptr::null_mut();
        self.len = 0;
        self.cap = 0;
    }
}

impl Drop for MallocStore {
    fn drop(&mut self) {
        // SAFETY: as for `release`.
        unsafe { libc::free(self.ptr.cast::<c_void>()) };
    }
}

// ---------------------------------------------------------------------------
// Shared bodies
// ---------------------------------------------------------------------------

unsafe fn printf_with<C: ArgumentCursor>(format: *const c_char, args: &mut C) -> c_int {
    let Some(fmt) = (unsafe { format_bytes(format) }) else {
        return fail(errno::EINVAL);
    };
    let mut sink = UnboundedSink::new(Console);
    let result = vformat(fmt, args, &mut sink, safety_level());
    // Bytes rendered before a failure still reach the console.
    sink.flush();
    c_result(result.and_then(|_| sink.finish()).map(|s| s.wanted))
}

unsafe fn snprintf_with<C: ArgumentCursor>(
    buf: *mut c_char,
    size: usize,
    format: *const c_char,
    args: &mut C,
) -> c_int {
    let Some(fmt) = (unsafe { format_bytes(format) }) else {
        return fail(errno::EINVAL);
    };
    let dst: &mut [u8] = if buf.is_null() || size == 0 {
        &mut []
    } else {
        // SAFETY: the caller provides `size` writable bytes at `buf`.
        unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), size) }
    };
    let mut sink = BoundedSink::new(dst);
    let result = vformat(fmt, args, &mut sink, safety_level());
    c_result(result.and_then(|_| sink.finish()).map(|s| s.wanted))
}

unsafe fn sprintf_with<C: ArgumentCursor>(
    buf: *mut c_char,
    format: *const c_char,
    args: &mut C,
) -> c_int {
    let Some(fmt) = (unsafe { format_bytes(format) }) else {
        return fail(errno::EINVAL);
    };
    if buf.is_null() {
        return fail(errno::EINVAL);
    }
    let mut sink = unsafe { RawSink::new(buf.cast::<u8>()) };
    let result = vformat(fmt, args, &mut sink, safety_level());
    c_result(result.and_then(|_| sink.finish()))
}

unsafe fn asprintf_with<C: ArgumentCursor>(
    strp: *mut *mut c_char,
    format: *const c_char,
    args: &mut C,
) -> c_int {
    let Some(fmt) = (unsafe { format_bytes(format) }) else {
        return fail(errno::EINVAL);
    };
    if strp.is_null() {
        return fail(errno::EINVAL);
    }
    let mut sink = GrowableSink::with_store(MallocStore::new(), None);
    let grown = match vformat(fmt, args, &mut sink, safety_level()).and_then(|_| sink.finish()) {
        Ok(grown) => grown,
        Err(err) => return fail(err.errno()),
    };
    let ret = match checked_c_int(grown.len) {
        Ok(n) => n,
        Err(err) => return fail(err.errno()),
    };
    unsafe { *strp = grown.bytes.into_raw() };
    ret
}

// ---------------------------------------------------------------------------
// printf / vprintf
// ---------------------------------------------------------------------------

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn printf(format: *const c_char, mut args: ...) -> c_int {
    let mut cursor = unsafe { VaCursor::new(va_pull!(args)) };
    unsafe { printf_with(format, &mut cursor) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn vprintf(format: *const c_char, mut ap: VaList) -> c_int {
    let mut cursor = unsafe { VaCursor::new(va_pull!(ap)) };
    unsafe { printf_with(format, &mut cursor) }
}

// ---------------------------------------------------------------------------
// snprintf / vsnprintf
// ---------------------------------------------------------------------------

/// Write at most `size - 1` bytes plus a NUL; returns the full length the
/// output needed.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn snprintf(
    buf: *mut c_char,
    size: usize,
    format: *const c_char,
    mut args: ...
) -> c_int {
    let mut cursor = unsafe { VaCursor::new(va_pull!(args)) };
    unsafe { snprintf_with(buf, size, format, &mut cursor) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn vsnprintf(
    buf: *mut c_char,
    size: usize,
    format: *const c_char,
    mut ap: VaList,
) -> c_int {
    let mut cursor = unsafe { VaCursor::new(va_pull!(ap)) };
    unsafe { snprintf_with(buf, size, format, &mut cursor) }
}

// ---------------------------------------------------------------------------
// sprintf / vsprintf
// ---------------------------------------------------------------------------

/// Unbounded write into `buf`. The caller must size `buf` for the output.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn sprintf(buf: *mut c_char, format: *const c_char, mut args: ...) -> c_int {
    let mut cursor = unsafe { VaCursor::new(va_pull!(args)) };
    unsafe { sprintf_with(buf, format, &mut cursor) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn vsprintf(buf: *mut c_char, format: *const c_char, mut ap: VaList) -> c_int {
    let mut cursor = unsafe { VaCursor::new(va_pull!(ap)) };
    unsafe { sprintf_with(buf, format, &mut cursor) }
}

// ---------------------------------------------------------------------------
// asprintf / vasprintf
// ---------------------------------------------------------------------------

/// Allocate the output with `malloc` and store it in `*strp`. On failure
/// `*strp` is left untouched.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn asprintf(
    strp: *mut *mut c_char,
    format: *const c_char,
    mut args: ...
) -> c_int {
    let mut cursor = unsafe { VaCursor::new(va_pull!(args)) };
    unsafe { asprintf_with(strp, format, &mut cursor) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn vasprintf(
    strp: *mut *mut c_char,
    format: *const c_char,
    mut ap: VaList,
) -> c_int {
    let mut cursor = unsafe { VaCursor::new(va_pull!(ap)) };
    unsafe { asprintf_with(strp, format, &mut cursor) }
}

/// Release a buffer returned through `asprintf`.
///
/// # Safety
///
/// `ptr` must be null or a pointer produced by `asprintf`/`vasprintf`.
pub unsafe fn free_formatted(ptr: *mut c_char) {
    unsafe { libc::free(ptr.cast::<c_void>()) };
}
