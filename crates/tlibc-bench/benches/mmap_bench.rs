//! Region manager benchmarks.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tlibc_core::config::PAGE_SIZE;
use tlibc_core::mmap::{MAP_FIXED_NOREPLACE, MapRequest, PROT_READ, PROT_WRITE, RegionManager};

const ARENA_BASE: usize = 0x4000_0000;
const RW: i32 = PROT_READ | PROT_WRITE;

fn manager(pages: usize) -> RegionManager {
    match RegionManager::new(ARENA_BASE, pages * PAGE_SIZE, PAGE_SIZE) {
        Ok(m) => m,
        Err(err) => panic!("arena setup failed: {err}"),
    }
}

fn bench_map_unmap_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_unmap_cycle");
    for pages in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(pages), &pages, |b, &pages| {
            let mut m = manager(1024);
            b.iter(|| {
                let addr = m.map(MapRequest::anonymous(pages * PAGE_SIZE, RW));
                if let Ok(addr) = addr {
                    let _ = m.unmap(addr, pages * PAGE_SIZE);
                }
                black_box(addr)
            });
        });
    }
    group.finish();
}

/// First-fit search cost with a fragmented free list.
fn bench_fragmented_first_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented_first_fit");
    for holes in [16usize, 256, 2048] {
        let mut m = manager(holes * 2 + 8);
        let mut live = Vec::new();
        for _ in 0..holes * 2 {
            if let Ok(addr) = m.map(MapRequest::anonymous(PAGE_SIZE, RW)) {
                live.push(addr);
            }
        }
        for addr in live.iter().step_by(2) {
            let _ = m.unmap(*addr, PAGE_SIZE);
        }
        group.bench_with_input(BenchmarkId::from_parameter(holes), &holes, |b, _| {
            b.iter(|| {
                let addr = m.map(MapRequest::anonymous(2 * PAGE_SIZE, RW));
                if let Ok(addr) = addr {
                    let _ = m.unmap(addr, 2 * PAGE_SIZE);
                }
                black_box(addr)
            });
        });
    }
    group.finish();
}

fn bench_noreplace_collision(c: &mut Criterion) {
    let mut m = manager(64);
    let taken = m.map(MapRequest::anonymous(32 * PAGE_SIZE, RW)).ok();
    c.bench_function("noreplace_collision", |b| {
        b.iter(|| {
            let req = MapRequest::fixed(ARENA_BASE + 8 * PAGE_SIZE, PAGE_SIZE, RW, MAP_FIXED_NOREPLACE);
            black_box(m.map(req))
        });
    });
    black_box(taken);
}

criterion_group!(
    benches,
    bench_map_unmap_cycle,
    bench_fragmented_first_fit,
    bench_noreplace_collision
);
criterion_main!(benches);
