//! Console output channel behind `printf`/`vprintf`.
//!
//! A bare-metal target installs its serial or VGA driver with
//! [`tlibc_set_console`]. Until one is installed, output goes to file
//! descriptor 1 through the host's `write(2)`.

use std::ffi::c_void;

use parking_lot::RwLock;
use tlibc_core::stdio::OutputChannel;

/// Driver callback: write `len` bytes starting at `bytes`.
pub type ConsoleWriteFn = unsafe extern "C" fn(bytes: *const u8, len: usize);

static CONSOLE: RwLock<Option<ConsoleWriteFn>> = parking_lot::const_rwlock(None);

/// Install (or, with `None`, remove) the console driver.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn tlibc_set_console(hook: Option<ConsoleWriteFn>) {
    *CONSOLE.write() = hook;
}

/// Channel that forwards to the installed driver or to fd 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl OutputChannel for Console {
    fn write_bytes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(hook) = *CONSOLE.read() {
            // SAFETY: the installer guarantees the driver accepts any
            // readable byte range.
            unsafe { hook(bytes.as_ptr(), bytes.len()) };
            return;
        }
        write_stdout(bytes);
    }
}

fn write_stdout(mut bytes: &[u8]) {
    while !bytes.is_empty() {
        // SAFETY: `bytes` is a live slice.
        let n = unsafe { libc::write(1, bytes.as_ptr().cast::<c_void>(), bytes.len()) };
        // printf has no channel for reporting a failed console write.
        if n <= 0 {
            return;
        }
        bytes = &bytes[n as usize..];
    }
}
