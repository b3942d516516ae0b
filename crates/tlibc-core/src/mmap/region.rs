//! Region manager: the mapped/free bookkeeping behind `mmap` and `munmap`.
//!
//! The arena `[base, base + len)` is always partitioned exactly into mapped
//! regions and free ranges. Mapped regions live in a `BTreeMap` keyed by base
//! address; free ranges live in a sorted `Vec` in which adjacent ranges are
//! always coalesced.
//!
//! # Algorithm
//!
//! - **Map (non-fixed)**: first-fit scan of the free list; `addr` is only a
//!   hint and is ignored.
//! - **Map (fixed)**: unmap whatever overlaps the target range (or fail with
//!   `AddressInUse` under `MAP_FIXED_NOREPLACE`), then carve the exact range
//!   out of the free list.
//! - **Unmap**: the range must be fully mapped. Regions straddling either end
//!   are split; the freed pieces are inserted with neighbour coalescing.
//!
//! Every failing call leaves both tables untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::config::SafetyLevel;
use crate::error::MapError;
use crate::metrics::{RuntimeMetrics, metrics};
use crate::mmap::{
    MAP_ANONYMOUS, MAP_FIXED_NOREPLACE, MAP_PRIVATE, is_fixed, sanitize_map_flags,
    sanitize_prot, valid_map_flags, valid_prot,
};

/// One mapped range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: usize,
    /// Page-aligned length in bytes.
    pub len: usize,
    pub prot: i32,
    pub flags: i32,
    /// Opaque id of the `mmap` call that created the region. Pieces split
    /// off by partial unmaps keep it.
    pub owner: u64,
}

impl MemoryRegion {
    #[must_use]
    pub const fn end(&self) -> usize {
        self.base + self.len
    }

    #[must_use]
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.end()
    }
}

/// One unallocated range of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRange {
    pub base: usize,
    pub len: usize,
}

impl FreeRange {
    #[must_use]
    pub const fn end(&self) -> usize {
        self.base + self.len
    }
}

/// Arguments of one `mmap` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapRequest {
    pub addr: usize,
    pub len: usize,
    pub prot: i32,
    pub flags: i32,
    /// Ignored for anonymous mappings.
    pub fd: i32,
    pub offset: i64,
}

impl MapRequest {
    /// `mmap(NULL, len, prot, MAP_PRIVATE | MAP_ANONYMOUS, -1, 0)`.
    #[must_use]
    pub const fn anonymous(len: usize, prot: i32) -> Self {
        Self {
            addr: 0,
            len,
            prot,
            flags: MAP_PRIVATE | MAP_ANONYMOUS,
            fd: -1,
            offset: 0,
        }
    }

    /// Anonymous private mapping at exactly `addr` with the given fixed flag
    /// (`MAP_FIXED` or `MAP_FIXED_NOREPLACE`).
    #[must_use]
    pub const fn fixed(addr: usize, len: usize, prot: i32, fixed_flag: i32) -> Self {
        Self {
            addr,
            len,
            prot,
            flags: MAP_PRIVATE | MAP_ANONYMOUS | fixed_flag,
            fd: -1,
            offset: 0,
        }
    }
}

/// Owner of the mapped and free ranges of one arena.
#[derive(Debug, Clone)]
pub struct RegionManager {
    arena_base: usize,
    arena_len: usize,
    page_size: usize,
    level: SafetyLevel,
    mapped: BTreeMap<usize, MemoryRegion>,
    /// Sorted by base; adjacent entries are always coalesced.
    free: Vec<FreeRange>,
    next_owner: u64,
}

impl RegionManager {
    /// Manage the arena `[arena_base, arena_base + arena_len)`.
    ///
    /// `page_size` must be a power of two and `arena_base` non-null and page
    /// aligned. `arena_len` is rounded down to whole pages and must leave at
    /// least one.
    pub fn new(arena_base: usize, arena_len: usize, page_size: usize) -> Result<Self, MapError> {
        if !page_size.is_power_of_two() {
            return Err(MapError::InvalidLength);
        }
        if arena_base == 0 || arena_base % page_size != 0 {
            return Err(MapError::InvalidRange);
        }
        let arena_len = arena_len - arena_len % page_size;
        if arena_len == 0 {
            return Err(MapError::InvalidLength);
        }
        if arena_base.checked_add(arena_len).is_none() {
            return Err(MapError::InvalidRange);
        }
        Ok(Self {
            arena_base,
            arena_len,
            page_size,
            level: SafetyLevel::Strict,
            mapped: BTreeMap::new(),
            free: vec![FreeRange {
                base: arena_base,
                len: arena_len,
            }],
            next_owner: 1,
        })
    }

    /// Use `level` for flag validation (strict rejects, hardened repairs).
    #[must_use]
    pub fn with_level(mut self, level: SafetyLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn level(&self) -> SafetyLevel {
        self.level
    }

    #[must_use]
    pub fn arena_base(&self) -> usize {
        self.arena_base
    }

    #[must_use]
    pub fn arena_len(&self) -> usize {
        self.arena_len
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Round `len` up to whole pages. `None` on overflow.
    #[must_use]
    pub fn page_round_up(&self, len: usize) -> Option<usize> {
        len.checked_next_multiple_of(self.page_size)
    }

    /// Serve one `mmap` request. Returns the base address of the new region.
    pub fn map(&mut self, req: MapRequest) -> Result<usize, MapError> {
        let result = self.try_map(req);
        match result {
            Ok(_) => RuntimeMetrics::inc(&metrics().maps),
            Err(_) => RuntimeMetrics::inc(&metrics().map_failures),
        }
        result
    }

    fn try_map(&mut self, req: MapRequest) -> Result<usize, MapError> {
        if req.len == 0 {
            return Err(MapError::InvalidLength);
        }
        let len = self.page_round_up(req.len).ok_or(MapError::InvalidLength)?;
        let prot = self.checked_prot(req.prot)?;
        let flags = if valid_map_flags(req.flags) {
            req.flags
        } else if self.level.heals_enabled() {
            RuntimeMetrics::inc(&metrics().sanitized);
            sanitize_map_flags(req.flags)
        } else {
            return Err(MapError::InvalidFlags);
        };
        if flags & MAP_ANONYMOUS == 0 {
            return Err(MapError::Unsupported);
        }
        if req.offset < 0 || req.offset as u64 % self.page_size as u64 != 0 {
            return Err(MapError::InvalidRange);
        }

        let base = if is_fixed(flags) {
            let end = self.fixed_range(req.addr, len)?;
            if self.overlapping(req.addr, end).next().is_some() {
                if flags & MAP_FIXED_NOREPLACE != 0 {
                    return Err(MapError::AddressInUse);
                }
                self.release_range(req.addr, end);
            }
            self.carve(req.addr, len);
            req.addr
        } else {
            let base = self
                .free
                .iter()
                .find(|r| r.len >= len)
                .map(|r| r.base)
                .ok_or(MapError::NoSpace)?;
            self.carve(base, len);
            base
        };

        let owner = self.next_owner;
        self.next_owner += 1;
        self.mapped.insert(
            base,
            MemoryRegion {
                base,
                len,
                prot,
                flags,
                owner,
            },
        );
        Ok(base)
    }

    /// Serve one `munmap` request.
    pub fn unmap(&mut self, addr: usize, len: usize) -> Result<(), MapError> {
        let result = self.try_unmap(addr, len);
        match result {
            Ok(()) => RuntimeMetrics::inc(&metrics().unmaps),
            Err(_) => RuntimeMetrics::inc(&metrics().map_failures),
        }
        result
    }

    fn try_unmap(&mut self, addr: usize, len: usize) -> Result<(), MapError> {
        if len == 0 {
            return Err(MapError::InvalidLength);
        }
        let end = self.aligned_range(addr, len)?;
        if !self.is_covered(addr, end) {
            return Err(MapError::InvalidRange);
        }
        self.release_range(addr, end);
        Ok(())
    }

    /// Change the protection of a fully mapped range (`mprotect`), splitting
    /// regions at the range boundaries.
    pub fn protect(&mut self, addr: usize, len: usize, prot: i32) -> Result<(), MapError> {
        let result = self.try_protect(addr, len, prot);
        if result.is_err() {
            RuntimeMetrics::inc(&metrics().map_failures);
        }
        result
    }

    fn try_protect(&mut self, addr: usize, len: usize, prot: i32) -> Result<(), MapError> {
        let prot = self.checked_prot(prot)?;
        if len == 0 {
            return if addr % self.page_size == 0 {
                Ok(())
            } else {
                Err(MapError::InvalidRange)
            };
        }
        let end = self.aligned_range(addr, len)?;
        if !self.is_covered(addr, end) {
            return Err(MapError::NotMapped);
        }
        let hits: Vec<MemoryRegion> = self.overlapping(addr, end).collect();
        for region in hits {
            self.mapped.remove(&region.base);
            let lo = region.base.max(addr);
            let hi = region.end().min(end);
            self.insert_piece(region, region.base, lo);
            self.insert_piece(MemoryRegion { prot, ..region }, lo, hi);
            self.insert_piece(region, hi, region.end());
        }
        Ok(())
    }

    /// `Ok` if `[addr, addr + len)` (rounded to pages) is entirely mapped.
    pub fn check_mapped(&self, addr: usize, len: usize) -> Result<(), MapError> {
        if len == 0 {
            return Err(MapError::InvalidLength);
        }
        let end = self.aligned_range(addr, len)?;
        if self.is_covered(addr, end) {
            Ok(())
        } else {
            Err(MapError::NotMapped)
        }
    }

    /// The mapped region containing `addr`, if any.
    #[must_use]
    pub fn query(&self, addr: usize) -> Option<MemoryRegion> {
        self.mapped
            .range(..=addr)
            .next_back()
            .map(|(_, r)| *r)
            .filter(|r| r.contains(addr))
    }

    /// Mapped regions in address order.
    pub fn regions(&self) -> impl Iterator<Item = &MemoryRegion> + '_ {
        self.mapped.values()
    }

    /// Free ranges in address order.
    #[must_use]
    pub fn free_ranges(&self) -> &[FreeRange] {
        &self.free
    }

    #[must_use]
    pub fn mapped_bytes(&self) -> usize {
        self.mapped.values().map(|r| r.len).sum()
    }

    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.free.iter().map(|r| r.len).sum()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn checked_prot(&self, prot: i32) -> Result<i32, MapError> {
        if valid_prot(prot) {
            Ok(prot)
        } else if self.level.heals_enabled() {
            RuntimeMetrics::inc(&metrics().sanitized);
            Ok(sanitize_prot(prot))
        } else {
            Err(MapError::InvalidFlags)
        }
    }

    /// Validate a page-aligned `addr` and return the page-rounded end.
    fn aligned_range(&self, addr: usize, len: usize) -> Result<usize, MapError> {
        if addr % self.page_size != 0 {
            return Err(MapError::InvalidRange);
        }
        self.page_round_up(len)
            .and_then(|len| addr.checked_add(len))
            .ok_or(MapError::InvalidRange)
    }

    /// Validate a fixed placement and return its end.
    fn fixed_range(&self, addr: usize, len: usize) -> Result<usize, MapError> {
        let end = self.aligned_range(addr, len)?;
        if addr < self.arena_base || end > self.arena_base + self.arena_len {
            return Err(MapError::InvalidRange);
        }
        Ok(end)
    }

    fn overlapping(&self, addr: usize, end: usize) -> impl Iterator<Item = MemoryRegion> + '_ {
        self.mapped
            .range(..end)
            .map(|(_, r)| *r)
            .filter(move |r| r.end() > addr)
    }

    /// True if mapped regions cover `[addr, end)` without gaps.
    fn is_covered(&self, addr: usize, end: usize) -> bool {
        let mut cursor = addr;
        for region in self.overlapping(addr, end) {
            if region.base > cursor {
                return false;
            }
            cursor = region.end();
        }
        cursor >= end
    }

    /// Unmap whatever lies in `[addr, end)`, splitting straddling regions and
    /// returning the freed pieces to the free list.
    fn release_range(&mut self, addr: usize, end: usize) {
        let hits: Vec<MemoryRegion> = self.overlapping(addr, end).collect();
        for region in hits {
            self.mapped.remove(&region.base);
            let lo = region.base.max(addr);
            let hi = region.end().min(end);
            self.insert_piece(region, region.base, lo);
            self.insert_piece(region, hi, region.end());
            self.free_insert(lo, hi - lo);
        }
    }

    fn insert_piece(&mut self, template: MemoryRegion, base: usize, end: usize) {
        if end > base {
            self.mapped.insert(
                base,
                MemoryRegion {
                    base,
                    len: end - base,
                    ..template
                },
            );
        }
    }

    /// Remove `[base, base + len)` from the free list. The range must lie
    /// within one free entry.
    fn carve(&mut self, base: usize, len: usize) {
        let idx = self.free.partition_point(|r| r.base <= base).wrapping_sub(1);
        let Some(entry) = self.free.get(idx).copied() else {
            return;
        };
        debug_assert!(entry.base <= base && base + len <= entry.end());
        let head = FreeRange {
            base: entry.base,
            len: base - entry.base,
        };
        let tail = FreeRange {
            base: base + len,
            len: entry.end() - (base + len),
        };
        match (head.len > 0, tail.len > 0) {
            (true, true) => {
                self.free[idx] = head;
                self.free.insert(idx + 1, tail);
            }
            (true, false) => self.free[idx] = head,
            (false, true) => self.free[idx] = tail,
            (false, false) => {
                self.free.remove(idx);
            }
        }
    }

    /// Return `[base, base + len)` to the free list, coalescing with both
    /// neighbours.
    fn free_insert(&mut self, base: usize, len: usize) {
        if len == 0 {
            return;
        }
        let end = base + len;
        let idx = self.insertion_index(base);
        let merge_prev = idx > 0 && self.free[idx - 1].end() == base;
        let merge_next = idx < self.free.len() && self.free[idx].base == end;

        match (merge_prev, merge_next) {
            (true, true) => {
                let succ = self.free.remove(idx);
                self.free[idx - 1].len += len + succ.len;
            }
            (true, false) => self.free[idx - 1].len += len,
            (false, true) => {
                self.free[idx].base = base;
                self.free[idx].len += len;
            }
            (false, false) => self.free.insert(idx, FreeRange { base, len }),
        }
    }

    /// Index of the first free entry with `base >= addr`.
    fn insertion_index(&self, addr: usize) -> usize {
        match self.free.binary_search_by_key(&addr, |r| r.base) {
            Ok(i) | Err(i) => i,
        }
    }
}

/// Cloneable handle to one [`RegionManager`] behind a single lock.
#[derive(Debug, Clone)]
pub struct SharedRegionManager {
    inner: Arc<Mutex<RegionManager>>,
}

impl SharedRegionManager {
    #[must_use]
    pub fn new(manager: RegionManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Hold the lock across several operations.
    pub fn lock(&self) -> MutexGuard<'_, RegionManager> {
        self.inner.lock()
    }

    pub fn map(&self, req: MapRequest) -> Result<usize, MapError> {
        self.inner.lock().map(req)
    }

    pub fn unmap(&self, addr: usize, len: usize) -> Result<(), MapError> {
        self.inner.lock().unmap(addr, len)
    }

    pub fn protect(&self, addr: usize, len: usize, prot: i32) -> Result<(), MapError> {
        self.inner.lock().protect(addr, len, prot)
    }

    #[must_use]
    pub fn query(&self, addr: usize) -> Option<MemoryRegion> {
        self.inner.lock().query(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmap::{MAP_FIXED, MAP_SHARED, PROT_READ, PROT_WRITE};

    const PAGE: usize = 4096;
    const BASE: usize = 0x10_0000;
    const RW: i32 = PROT_READ | PROT_WRITE;

    fn manager(pages: usize) -> RegionManager {
        RegionManager::new(BASE, pages * PAGE, PAGE).unwrap()
    }

    fn assert_partitioned(m: &RegionManager) {
        assert_eq!(m.mapped_bytes() + m.free_bytes(), m.arena_len());
        for pair in m.free_ranges().windows(2) {
            assert!(pair[0].end() < pair[1].base, "free list not coalesced");
        }
    }

    #[test]
    fn new_rejects_bad_geometry() {
        let err = |base, len, page| RegionManager::new(base, len, page).unwrap_err();
        assert_eq!(err(BASE, PAGE, 3000), MapError::InvalidLength);
        assert_eq!(err(BASE + 1, PAGE, PAGE), MapError::InvalidRange);
        assert_eq!(err(BASE, PAGE - 1, PAGE), MapError::InvalidLength);
        assert_eq!(err(0, 16 * PAGE, PAGE), MapError::InvalidRange);
    }

    #[test]
    fn first_fit_is_lowest_address() {
        let mut m = manager(8);
        let a = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        let b = m.map(MapRequest::anonymous(1, RW)).unwrap();
        assert_eq!(a, BASE);
        assert_eq!(b, BASE + PAGE);
        assert_eq!(m.query(b).unwrap().len, PAGE);
        assert_partitioned(&m);
    }

    #[test]
    fn hint_is_ignored_without_fixed() {
        let mut m = manager(4);
        let req = MapRequest {
            addr: BASE + 2 * PAGE,
            ..MapRequest::anonymous(PAGE, RW)
        };
        assert_eq!(m.map(req).unwrap(), BASE);
    }

    #[test]
    fn zero_length_rejected() {
        let mut m = manager(4);
        assert_eq!(m.map(MapRequest::anonymous(0, RW)), Err(MapError::InvalidLength));
        assert_eq!(m.map(MapRequest::anonymous(usize::MAX, RW)), Err(MapError::InvalidLength));
    }

    #[test]
    fn flag_validation_strict() {
        let mut m = manager(4);
        let mut req = MapRequest::anonymous(PAGE, RW);
        req.flags |= MAP_SHARED;
        assert_eq!(m.map(req), Err(MapError::InvalidFlags));
        assert_eq!(m.map(MapRequest::anonymous(PAGE, 0x40)), Err(MapError::InvalidFlags));
        let file_backed = MapRequest {
            flags: MAP_PRIVATE,
            fd: 3,
            ..MapRequest::anonymous(PAGE, RW)
        };
        assert_eq!(m.map(file_backed), Err(MapError::Unsupported));
        let bad_offset = MapRequest {
            offset: 100,
            ..MapRequest::anonymous(PAGE, RW)
        };
        assert_eq!(m.map(bad_offset), Err(MapError::InvalidRange));
        assert_eq!(m.mapped_bytes(), 0);
    }

    #[test]
    fn flag_repair_hardened() {
        let mut m = manager(4).with_level(SafetyLevel::Hardened);
        let mut req = MapRequest::anonymous(PAGE, RW | 0x40);
        req.flags |= MAP_SHARED;
        let base = m.map(req).unwrap();
        let region = m.query(base).unwrap();
        assert_eq!(region.prot, RW);
        assert_eq!(region.flags, MAP_PRIVATE | MAP_ANONYMOUS);
    }

    #[test]
    fn fixed_noreplace_collision() {
        let mut m = manager(4);
        let a = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        let req = MapRequest::fixed(a, PAGE, RW, MAP_FIXED_NOREPLACE);
        assert_eq!(m.map(req), Err(MapError::AddressInUse));
        assert_eq!(m.regions().count(), 1);
    }

    #[test]
    fn fixed_noreplace_into_free_space() {
        let mut m = manager(4);
        let at = BASE + 2 * PAGE;
        assert_eq!(m.map(MapRequest::fixed(at, PAGE, RW, MAP_FIXED_NOREPLACE)), Ok(at));
        assert_eq!(m.free_ranges().len(), 2);
        assert_partitioned(&m);
    }

    #[test]
    fn fixed_replaces_overlap() {
        let mut m = manager(4);
        let a = m.map(MapRequest::anonymous(3 * PAGE, PROT_READ)).unwrap();
        let old_owner = m.query(a).unwrap().owner;
        let mid = a + PAGE;
        assert_eq!(m.map(MapRequest::fixed(mid, PAGE, RW, MAP_FIXED)), Ok(mid));
        let regions: Vec<_> = m.regions().copied().collect();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].owner, old_owner);
        assert_eq!(regions[2].owner, old_owner);
        assert_ne!(regions[1].owner, old_owner);
        assert_eq!(regions[1].prot, RW);
        assert_partitioned(&m);
    }

    #[test]
    fn fixed_outside_arena_or_misaligned() {
        let mut m = manager(4);
        assert_eq!(
            m.map(MapRequest::fixed(BASE + 4 * PAGE, PAGE, RW, MAP_FIXED)),
            Err(MapError::InvalidRange)
        );
        assert_eq!(
            m.map(MapRequest::fixed(BASE + 1, PAGE, RW, MAP_FIXED)),
            Err(MapError::InvalidRange)
        );
        assert_eq!(
            m.map(MapRequest::fixed(BASE - PAGE, PAGE, RW, MAP_FIXED)),
            Err(MapError::InvalidRange)
        );
    }

    #[test]
    fn no_space_when_fragmented() {
        let mut m = manager(3);
        let a = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        m.unmap(a, PAGE).unwrap();
        assert_eq!(m.map(MapRequest::anonymous(2 * PAGE, RW)), Err(MapError::NoSpace));
    }

    #[test]
    fn unmap_middle_splits_region() {
        let mut m = manager(4);
        let a = m.map(MapRequest::anonymous(3 * PAGE, RW)).unwrap();
        m.unmap(a + PAGE, PAGE).unwrap();
        assert_eq!(m.query(a).unwrap().len, PAGE);
        assert_eq!(m.query(a + PAGE), None);
        assert_eq!(m.query(a + 2 * PAGE).unwrap().base, a + 2 * PAGE);
        assert_partitioned(&m);
    }

    #[test]
    fn unmap_requires_full_coverage() {
        let mut m = manager(4);
        let a = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        assert_eq!(m.unmap(a, 2 * PAGE), Err(MapError::InvalidRange));
        assert_eq!(m.unmap(a + 1, PAGE), Err(MapError::InvalidRange));
        assert_eq!(m.unmap(a + 3 * PAGE, PAGE), Err(MapError::InvalidRange));
        assert_eq!(m.unmap(a, 0), Err(MapError::InvalidLength));
        assert_eq!(m.mapped_bytes(), PAGE);
    }

    #[test]
    fn unmap_spanning_adjacent_regions() {
        let mut m = manager(4);
        let a = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        m.map(MapRequest::anonymous(PAGE, PROT_READ)).unwrap();
        m.unmap(a, 2 * PAGE).unwrap();
        assert_eq!(m.mapped_bytes(), 0);
        assert_eq!(
            m.free_ranges(),
            &[FreeRange {
                base: BASE,
                len: 4 * PAGE
            }]
        );
    }

    #[test]
    fn adjacent_frees_coalesce() {
        let mut m = manager(4);
        let a = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        let b = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        let c = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        m.unmap(a, PAGE).unwrap();
        m.unmap(c, PAGE).unwrap();
        assert_eq!(m.free_ranges().len(), 2);
        m.unmap(b, PAGE).unwrap();
        assert_eq!(m.free_ranges().len(), 1);
        assert_eq!(m.map(MapRequest::anonymous(4 * PAGE, RW)), Ok(BASE));
    }

    #[test]
    fn protect_splits_and_updates() {
        let mut m = manager(4);
        let a = m.map(MapRequest::anonymous(3 * PAGE, RW)).unwrap();
        m.protect(a + PAGE, PAGE, PROT_READ).unwrap();
        assert_eq!(m.query(a).unwrap().prot, RW);
        assert_eq!(m.query(a + PAGE).unwrap().prot, PROT_READ);
        assert_eq!(m.query(a + 2 * PAGE).unwrap().prot, RW);
        assert_eq!(m.protect(a + 3 * PAGE, PAGE, RW), Err(MapError::NotMapped));
        assert_partitioned(&m);
    }

    #[test]
    fn check_mapped_reports_gaps() {
        let mut m = manager(4);
        let a = m.map(MapRequest::anonymous(PAGE, RW)).unwrap();
        assert_eq!(m.check_mapped(a, 10), Ok(()));
        assert_eq!(m.check_mapped(a, 2 * PAGE), Err(MapError::NotMapped));
    }

    #[test]
    fn shared_handle_serializes_access() {
        let shared = SharedRegionManager::new(manager(16));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..4 {
                        let a = shared.map(MapRequest::anonymous(PAGE, RW)).unwrap();
                        shared.unmap(a, PAGE).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let guard = shared.lock();
        assert_eq!(guard.mapped_bytes(), 0);
        assert_eq!(guard.free_ranges().len(), 1);
    }
}
