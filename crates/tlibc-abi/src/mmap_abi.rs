//! ABI layer for anonymous memory mapping: `mmap`, `munmap`, `mprotect`,
//! `msync`, `madvise`.
//!
//! One process-wide [`RegionManager`] serves every call under a single lock.
//! Its arena is either handed over by the embedder through
//! [`tlibc_arena_init`] or allocated on first use with the size from
//! `TLIBC_ARENA_BYTES`.

use std::alloc::{Layout, alloc_zeroed};
use std::ffi::{c_int, c_void};
use std::ptr;

use parking_lot::Mutex;
use tlibc_core::MapError;
use tlibc_core::config::{ArenaConfig, PAGE_SIZE, safety_level};
use tlibc_core::errno;
use tlibc_core::mmap::{
    self, MADV_DONTNEED, MAP_FAILED, MAP_PRIVATE, MapRequest, RegionManager,
};

use crate::errno_abi::set_abi_errno;

static MANAGER: Mutex<Option<RegionManager>> = parking_lot::const_mutex(None);

fn failed() -> *mut c_void {
    MAP_FAILED as *mut c_void
}

/// Run `f` on the global manager, installing the default arena first if
/// nothing is installed yet.
fn with_manager<R>(f: impl FnOnce(&mut RegionManager) -> R) -> Result<R, MapError> {
    let mut guard = MANAGER.lock();
    if guard.is_none() {
        *guard = Some(default_arena()?);
    }
    match guard.as_mut() {
        Some(manager) => Ok(f(manager)),
        None => Err(MapError::NoSpace),
    }
}

/// Allocate the default arena. It is never freed.
fn default_arena() -> Result<RegionManager, MapError> {
    let config = ArenaConfig::from_env();
    let layout = Layout::from_size_align(config.arena_bytes, config.page_size)
        .map_err(|_| MapError::InvalidLength)?;
    // SAFETY: `layout` has a non-zero size (at least one page).
    let base = unsafe { alloc_zeroed(layout) };
    if base.is_null() {
        return Err(MapError::NoSpace);
    }
    Ok(RegionManager::new(base as usize, config.arena_bytes, config.page_size)?
        .with_level(safety_level()))
}

/// Hand `[base, base + len)` to the region manager as its arena.
///
/// Must be called before the first `mmap`; returns -1 with `EEXIST` once an
/// arena is installed, and -1 with `EINVAL` for a null or misaligned `base`.
///
/// # Safety
///
/// The range must be readable, writable and exclusively owned by tlibc for
/// the rest of the process.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn tlibc_arena_init(base: *mut c_void, len: usize) -> c_int {
    if base.is_null() {
        set_abi_errno(errno::EINVAL);
        return -1;
    }
    let mut guard = MANAGER.lock();
    if guard.is_some() {
        set_abi_errno(errno::EEXIST);
        return -1;
    }
    match RegionManager::new(base as usize, len, PAGE_SIZE) {
        Ok(manager) => {
            *guard = Some(manager.with_level(safety_level()));
            0
        }
        Err(err) => {
            set_abi_errno(err.errno());
            -1
        }
    }
}

// ---------------------------------------------------------------------------
// mmap / munmap
// ---------------------------------------------------------------------------

/// POSIX `mmap`, anonymous mappings only.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn mmap(
    addr: *mut c_void,
    length: usize,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    offset: i64,
) -> *mut c_void {
    let req = MapRequest {
        addr: addr as usize,
        len: length,
        prot,
        flags,
        fd,
        offset,
    };
    let result = with_manager(|m| {
        let base = m.map(req)?;
        let len = m.query(base).map_or(0, |r| r.len);
        // SAFETY: the region lies inside the arena the manager owns, and the
        // lock keeps other callers from handing it out concurrently.
        unsafe { ptr::write_bytes(base as *mut u8, 0, len) };
        Ok(base)
    });
    match result.and_then(|r| r) {
        Ok(base) => base as *mut c_void,
        Err(err) => {
            set_abi_errno(err.errno());
            failed()
        }
    }
}

/// POSIX `munmap`. The whole page-rounded range must be mapped.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn munmap(addr: *mut c_void, length: usize) -> c_int {
    status(with_manager(|m| m.unmap(addr as usize, length)))
}

// ---------------------------------------------------------------------------
// mprotect / msync / madvise
// ---------------------------------------------------------------------------

/// POSIX `mprotect`. Protection is recorded, not enforced.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn mprotect(addr: *mut c_void, len: usize, prot: c_int) -> c_int {
    status(with_manager(|m| m.protect(addr as usize, len, prot)))
}

/// POSIX `msync`. Anonymous memory has no backing store, so this only
/// validates.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn msync(addr: *mut c_void, len: usize, flags: c_int) -> c_int {
    if !mmap::valid_msync_flags(flags) {
        set_abi_errno(errno::EINVAL);
        return -1;
    }
    status(with_manager(|m| {
        if addr as usize % m.page_size() != 0 {
            return Err(MapError::InvalidRange);
        }
        if len == 0 {
            return Ok(());
        }
        m.check_mapped(addr as usize, len)
    }))
}

/// POSIX `madvise`. `MADV_DONTNEED` zero-fills private pages; other advice
/// is accepted and ignored.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn madvise(addr: *mut c_void, len: usize, advice: c_int) -> c_int {
    if !mmap::valid_madvise(advice) {
        set_abi_errno(errno::EINVAL);
        return -1;
    }
    status(with_manager(|m| {
        let start = addr as usize;
        if start % m.page_size() != 0 {
            return Err(MapError::InvalidRange);
        }
        if len == 0 {
            return Ok(());
        }
        m.check_mapped(start, len)?;
        if advice == MADV_DONTNEED {
            let end = m
                .page_round_up(len)
                .and_then(|l| start.checked_add(l))
                .ok_or(MapError::InvalidRange)?;
            for region in m.regions().filter(|r| r.flags & MAP_PRIVATE != 0) {
                let lo = region.base.max(start);
                let hi = region.end().min(end);
                if lo < hi {
                    // SAFETY: `[lo, hi)` is mapped arena memory, under the lock.
                    unsafe { ptr::write_bytes(lo as *mut u8, 0, hi - lo) };
                }
            }
        }
        Ok(())
    }))
}

fn status(result: Result<Result<(), MapError>, MapError>) -> c_int {
    match result.and_then(|r| r) {
        Ok(()) => 0,
        Err(err) => {
            set_abi_errno(err.errno());
            -1
        }
    }
}
