//! ABI layer for `<errno.h>`: thread-local errno storage.

use std::cell::UnsafeCell;
use std::ffi::c_int;

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn __errno_location() -> *mut c_int {
    thread_local! {
        static ERRNO: UnsafeCell<c_int> = const { UnsafeCell::new(0) };
    }
    ERRNO.with(|cell| cell.get())
}

/// Store `val` into the calling thread's errno.
#[inline]
pub(crate) fn set_abi_errno(val: c_int) {
    // SAFETY: __errno_location returns this thread's live errno slot.
    unsafe { *__errno_location() = val };
}
