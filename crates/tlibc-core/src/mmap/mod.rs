//! Anonymous memory mapping.
//!
//! Constants and validators for `<sys/mman.h>` (`mmap`, `munmap`,
//! `mprotect`, `msync`, `madvise`) plus the [`RegionManager`] that carves
//! mappings out of a backing arena.

pub mod region;

pub use region::{FreeRange, MapRequest, MemoryRegion, RegionManager, SharedRegionManager};

// ---------------------------------------------------------------------------
// Protection flags (PROT_*)
// ---------------------------------------------------------------------------

pub const PROT_NONE: i32 = 0x0;
pub const PROT_READ: i32 = 0x1;
pub const PROT_WRITE: i32 = 0x2;
pub const PROT_EXEC: i32 = 0x4;

const PROT_MASK: i32 = PROT_READ | PROT_WRITE | PROT_EXEC;

// ---------------------------------------------------------------------------
// Mapping flags (MAP_*)
// ---------------------------------------------------------------------------

/// Share changes with other mappings of the same object.
pub const MAP_SHARED: i32 = 0x01;
/// Private copy-on-write mapping.
pub const MAP_PRIVATE: i32 = 0x02;
/// Place the mapping at exactly `addr`, replacing whatever is there.
pub const MAP_FIXED: i32 = 0x10;
/// Not backed by any file; contents start zeroed.
pub const MAP_ANONYMOUS: i32 = 0x20;
pub const MAP_ANON: i32 = MAP_ANONYMOUS;
/// Place the mapping at exactly `addr`, failing if anything is mapped there.
pub const MAP_FIXED_NOREPLACE: i32 = 0x10_0000;

/// Returned by mmap on failure (`(void *)-1`).
pub const MAP_FAILED: usize = usize::MAX;

const MAP_VISIBILITY_MASK: i32 = MAP_SHARED | MAP_PRIVATE;
const MAP_FLAGS_MASK: i32 =
    MAP_SHARED | MAP_PRIVATE | MAP_FIXED | MAP_ANONYMOUS | MAP_FIXED_NOREPLACE;

// ---------------------------------------------------------------------------
// msync flags (MS_*)
// ---------------------------------------------------------------------------

pub const MS_ASYNC: i32 = 1;
pub const MS_INVALIDATE: i32 = 2;
pub const MS_SYNC: i32 = 4;

const MS_MASK: i32 = MS_ASYNC | MS_SYNC | MS_INVALIDATE;

// ---------------------------------------------------------------------------
// madvise advice values (MADV_*)
// ---------------------------------------------------------------------------

pub const MADV_NORMAL: i32 = 0;
pub const MADV_RANDOM: i32 = 1;
pub const MADV_SEQUENTIAL: i32 = 2;
pub const MADV_WILLNEED: i32 = 3;
/// Drop the pages; anonymous private pages read back as zero.
pub const MADV_DONTNEED: i32 = 4;

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Returns true if `prot` contains only recognized PROT_* bits.
#[must_use]
pub const fn valid_prot(prot: i32) -> bool {
    (prot & !PROT_MASK) == 0
}

/// Returns true if `flags` has exactly one of MAP_SHARED/MAP_PRIVATE and only
/// recognized bits.
#[must_use]
pub const fn valid_map_flags(flags: i32) -> bool {
    let vis = flags & MAP_VISIBILITY_MASK;
    let has_one_vis = vis == MAP_SHARED || vis == MAP_PRIVATE;
    let known_only = (flags & !MAP_FLAGS_MASK) == 0;
    has_one_vis && known_only
}

/// Returns true if either fixed-placement flag is present.
#[must_use]
pub const fn is_fixed(flags: i32) -> bool {
    flags & (MAP_FIXED | MAP_FIXED_NOREPLACE) != 0
}

#[must_use]
pub const fn valid_madvise(advice: i32) -> bool {
    matches!(
        advice,
        MADV_NORMAL | MADV_RANDOM | MADV_SEQUENTIAL | MADV_WILLNEED | MADV_DONTNEED
    )
}

/// Returns true if `flags` contains only MS_* bits and does not combine
/// MS_ASYNC with MS_SYNC.
#[must_use]
pub const fn valid_msync_flags(flags: i32) -> bool {
    let known = (flags & !MS_MASK) == 0;
    let not_both = !((flags & MS_ASYNC != 0) && (flags & MS_SYNC != 0));
    known && not_both
}

/// Mask protection flags to the recognized bits.
#[must_use]
pub const fn sanitize_prot(prot: i32) -> i32 {
    prot & PROT_MASK
}

/// Drop unknown bits and repair visibility: none becomes MAP_PRIVATE, both
/// becomes MAP_PRIVATE.
#[must_use]
pub const fn sanitize_map_flags(flags: i32) -> i32 {
    let cleaned = flags & MAP_FLAGS_MASK;
    let vis = cleaned & MAP_VISIBILITY_MASK;
    if vis == 0 {
        cleaned | MAP_PRIVATE
    } else if vis == MAP_VISIBILITY_MASK {
        cleaned & !MAP_SHARED
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_linux() {
        assert_eq!(PROT_READ | PROT_WRITE | PROT_EXEC, 7);
        assert_eq!(MAP_SHARED, 1);
        assert_eq!(MAP_PRIVATE, 2);
        assert_eq!(MAP_FIXED, 16);
        assert_eq!(MAP_ANONYMOUS, 32);
        assert_eq!(MAP_FIXED_NOREPLACE, 1_048_576);
    }

    #[test]
    fn valid_prot_recognizes_combinations() {
        assert!(valid_prot(PROT_NONE));
        assert!(valid_prot(PROT_READ | PROT_WRITE | PROT_EXEC));
        assert!(!valid_prot(0x8));
        assert!(!valid_prot(-1));
    }

    #[test]
    fn valid_map_flags_check() {
        assert!(valid_map_flags(MAP_PRIVATE | MAP_ANONYMOUS));
        assert!(valid_map_flags(MAP_SHARED | MAP_ANONYMOUS | MAP_FIXED_NOREPLACE));
        assert!(!valid_map_flags(MAP_SHARED | MAP_PRIVATE));
        assert!(!valid_map_flags(MAP_ANONYMOUS));
        assert!(!valid_map_flags(MAP_PRIVATE | 0x100));
    }

    #[test]
    fn fixed_detection() {
        assert!(is_fixed(MAP_FIXED));
        assert!(is_fixed(MAP_FIXED_NOREPLACE));
        assert!(!is_fixed(MAP_PRIVATE | MAP_ANONYMOUS));
    }

    #[test]
    fn msync_and_madvise_validation() {
        assert!(valid_msync_flags(MS_SYNC | MS_INVALIDATE));
        assert!(!valid_msync_flags(MS_ASYNC | MS_SYNC));
        assert!(!valid_msync_flags(0x100));
        assert!(valid_madvise(MADV_DONTNEED));
        assert!(!valid_madvise(100));
    }

    #[test]
    fn sanitize_repairs_flags() {
        assert_eq!(sanitize_prot(0xff), PROT_MASK);
        assert_eq!(sanitize_map_flags(MAP_ANONYMOUS), MAP_ANONYMOUS | MAP_PRIVATE);
        let both = MAP_SHARED | MAP_PRIVATE | MAP_ANONYMOUS | 0x4000;
        assert_eq!(sanitize_map_flags(both), MAP_PRIVATE | MAP_ANONYMOUS);
    }
}
