//! Helper macros for ABI entry points.

/// Build the `va_arg` pull closure for a [`crate::va::VaCursor`] over a
/// variadic argument list (`...` parameter or `VaList`).
///
/// Keeps every `va_arg` type in one place so the entry points never name the
/// unstable list type beyond their own signatures.
macro_rules! va_pull {
    ($ap:expr) => {
        |slot: $crate::va::ArgSlot| -> $crate::va::ArgWord {
            use $crate::va::{ArgSlot, ArgWord};
            // SAFETY: the caller's format string promises an argument of
            // this promoted type at this position.
            unsafe {
                match slot {
                    ArgSlot::Int => ArgWord::Int(i64::from($ap.next_arg::<::std::ffi::c_int>())),
                    ArgSlot::Long => ArgWord::Int($ap.next_arg::<::std::ffi::c_long>() as i64),
                    ArgSlot::LongLong => ArgWord::Int($ap.next_arg::<i64>()),
                    ArgSlot::Size => ArgWord::Int($ap.next_arg::<usize>() as i64),
                    ArgSlot::Double => ArgWord::Double($ap.next_arg::<f64>()),
                    ArgSlot::Pointer => {
                        ArgWord::Pointer($ap.next_arg::<*const ::std::ffi::c_void>() as usize)
                    }
                }
            }
        }
    };
}

pub(crate) use va_pull;
