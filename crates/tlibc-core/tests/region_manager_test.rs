//! Region manager scenarios mirroring the `mmap`/`munmap` contract.

use tlibc_core::MapError;
use tlibc_core::errno;
use tlibc_core::mmap::{
    FreeRange, MAP_ANONYMOUS, MAP_FIXED, MAP_FIXED_NOREPLACE, MAP_PRIVATE, MapRequest,
    PROT_READ, PROT_WRITE, RegionManager, SharedRegionManager,
};

const PAGE: usize = 4096;
const ARENA_BASE: usize = 0x4000_0000;
const RW: i32 = PROT_READ | PROT_WRITE;

fn manager(pages: usize) -> RegionManager {
    RegionManager::new(ARENA_BASE, pages * PAGE, PAGE).unwrap()
}

fn anon(len: usize) -> MapRequest {
    MapRequest {
        addr: 0,
        len,
        prot: RW,
        flags: MAP_PRIVATE | MAP_ANONYMOUS,
        fd: -1,
        offset: 0,
    }
}

/// Regions sorted, pairwise disjoint, inside the arena; free list sorted and
/// coalesced; the two together cover the arena exactly.
fn assert_invariants(m: &RegionManager) {
    let arena_end = m.arena_base() + m.arena_len();
    let regions: Vec<_> = m.regions().copied().collect();
    for r in &regions {
        assert_eq!(r.base % PAGE, 0);
        assert_eq!(r.len % PAGE, 0);
        assert!(r.base >= m.arena_base() && r.end() <= arena_end);
    }
    for pair in regions.windows(2) {
        assert!(pair[0].end() <= pair[1].base);
    }
    for pair in m.free_ranges().windows(2) {
        assert!(pair[0].end() < pair[1].base);
    }
    assert_eq!(m.mapped_bytes() + m.free_bytes(), m.arena_len());
}

#[test]
fn anonymous_map_noreplace_unmap_reuse() {
    let mut m = manager(16);
    let addr = m.map(anon(4096)).unwrap();
    assert_eq!(addr % PAGE, 0);

    let again = MapRequest {
        addr,
        flags: MAP_PRIVATE | MAP_ANONYMOUS | MAP_FIXED_NOREPLACE,
        ..anon(4096)
    };
    let err = m.map(again).unwrap_err();
    assert_eq!(err, MapError::AddressInUse);
    assert_eq!(err.errno(), errno::EEXIST);

    m.unmap(addr, 4096).unwrap();
    assert_eq!(m.query(addr), None);
    assert_eq!(m.map(anon(4096)).unwrap(), addr);
    assert_invariants(&m);
}

#[test]
fn adjacent_ranges_merge_after_unmap() {
    let mut m = manager(2);
    let a = m.map(anon(PAGE)).unwrap();
    let b = m.map(anon(PAGE)).unwrap();
    assert_eq!(b, a + PAGE);
    assert_eq!(m.map(anon(PAGE)), Err(MapError::NoSpace));

    m.unmap(a, PAGE).unwrap();
    m.unmap(b, PAGE).unwrap();
    assert_eq!(
        m.free_ranges(),
        &[FreeRange {
            base: ARENA_BASE,
            len: 2 * PAGE
        }]
    );
    assert_eq!(m.map(anon(2 * PAGE)), Ok(a));
    assert_invariants(&m);
}

#[test]
fn length_is_rounded_up_to_pages() {
    let mut m = manager(4);
    let a = m.map(anon(PAGE + 1)).unwrap();
    assert_eq!(m.query(a).unwrap().len, 2 * PAGE);
    assert_eq!(m.query(a + PAGE + 100).unwrap().base, a);
    m.unmap(a, PAGE + 1).unwrap();
    assert_eq!(m.mapped_bytes(), 0);
}

#[test]
fn failed_calls_leave_tables_unchanged() {
    let mut m = manager(4);
    let a = m.map(anon(2 * PAGE)).unwrap();
    let before_regions: Vec<_> = m.regions().copied().collect();
    let before_free = m.free_ranges().to_vec();

    assert_eq!(m.map(anon(0)), Err(MapError::InvalidLength));
    assert_eq!(m.map(anon(3 * PAGE)), Err(MapError::NoSpace));
    let noreplace = MapRequest {
        addr: a + PAGE,
        flags: MAP_PRIVATE | MAP_ANONYMOUS | MAP_FIXED_NOREPLACE,
        ..anon(2 * PAGE)
    };
    assert_eq!(m.map(noreplace), Err(MapError::AddressInUse));
    assert_eq!(m.unmap(a + PAGE, 2 * PAGE), Err(MapError::InvalidRange));
    assert_eq!(m.unmap(a + 7, PAGE), Err(MapError::InvalidRange));

    assert_eq!(m.regions().copied().collect::<Vec<_>>(), before_regions);
    assert_eq!(m.free_ranges(), before_free.as_slice());
}

#[test]
fn fixed_replace_then_partial_unmaps() {
    let mut m = manager(8);
    let a = m.map(anon(4 * PAGE)).unwrap();
    let fixed = MapRequest {
        addr: a + 3 * PAGE,
        flags: MAP_PRIVATE | MAP_ANONYMOUS | MAP_FIXED,
        prot: PROT_READ,
        ..anon(2 * PAGE)
    };
    assert_eq!(m.map(fixed), Ok(a + 3 * PAGE));
    assert_eq!(m.query(a + 2 * PAGE).unwrap().len, 3 * PAGE);
    assert_eq!(m.query(a + 4 * PAGE).unwrap().prot, PROT_READ);
    assert_invariants(&m);

    // Spans the tail of the first region and the head of the second.
    m.unmap(a + 2 * PAGE, 2 * PAGE).unwrap();
    assert_eq!(m.query(a + 2 * PAGE), None);
    assert_eq!(m.query(a + 3 * PAGE), None);
    assert_eq!(m.query(a + 4 * PAGE).unwrap().base, a + 4 * PAGE);
    assert_invariants(&m);
}

#[test]
fn churn_keeps_invariants() {
    let mut m = manager(32);
    let mut live = Vec::new();
    for i in 0..64usize {
        let pages = i % 3 + 1;
        match m.map(anon(pages * PAGE)) {
            Ok(addr) => live.push((addr, pages * PAGE)),
            Err(e) => assert_eq!(e, MapError::NoSpace),
        }
        if i % 4 == 3 {
            let (addr, len) = live.remove(live.len() / 2);
            m.unmap(addr, len).unwrap();
        }
        assert_invariants(&m);
    }
    for (addr, len) in live {
        m.unmap(addr, len).unwrap();
    }
    assert_eq!(m.free_ranges().len(), 1);
}

#[test]
fn shared_manager_is_usable_across_threads() {
    let shared = SharedRegionManager::new(manager(64));
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                let addr = shared.map(anon(PAGE)).unwrap();
                assert!(shared.query(addr).is_some());
                addr
            })
        })
        .collect();
    let mut addrs: Vec<usize> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    addrs.sort_unstable();
    addrs.dedup();
    assert_eq!(addrs.len(), 8);
    assert_invariants(&shared.lock());
}
