//! Benchmark for consumer-side cache work.
//!
//! TARGET: a full pending scan over ~5,000 chunks well under one frame (16ms)
//!
//! Run with: cargo bench --package tessera_streaming --bench cache_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tessera_chunk::{Block, Chunk};
use tessera_shared::{IVec3, Region3, Vec3};
use tessera_streaming::{ChunkCache, PendingQueue, RegionView};

/// 17x17x17 chunks around the origin.
fn filled_cache() -> ChunkCache {
    let mut cache = ChunkCache::new();
    for position in Region3::from_center_extents(IVec3::ZERO, IVec3::splat(8)).iter() {
        cache.insert(Arc::new(Chunk::new(position)));
    }
    cache
}

fn benchmark_neighborhood(c: &mut Criterion) {
    let cache = filled_cache();
    c.bench_function("neighborhood_snapshot", |b| {
        b.iter(|| black_box(cache.neighborhood(black_box(IVec3::new(2, -3, 1)))));
    });
}

fn benchmark_local_view(c: &mut Criterion) {
    let cache = filled_cache();
    let region = Region3::from_center_extents(IVec3::ZERO, IVec3::ONE);

    let mut group = c.benchmark_group("region_view");
    group.bench_function("build_local", |b| {
        b.iter(|| {
            black_box(RegionView::build(region, IVec3::ONE, Block::AIR, |pos| {
                cache.get(pos).cloned()
            }))
        });
    });

    let view = RegionView::build(region, IVec3::ONE, Block::AIR, |pos| cache.get(pos).cloned());
    if let Some(view) = view {
        group.throughput(Throughput::Elements(48 * 48 * 48));
        group.bench_function("read_all_blocks", |b| {
            b.iter(|| {
                let mut solid = 0u32;
                for pos in view.block_region().iter() {
                    if !view.block(pos).is_air() {
                        solid += 1;
                    }
                }
                black_box(solid)
            });
        });
    }
    group.finish();
}

fn benchmark_pending_scan(c: &mut Criterion) {
    let cache = filled_cache();
    let reference = Vec3::new(40.0, 8.0, -20.0);

    let mut group = c.benchmark_group("pending_queue");
    group.throughput(Throughput::Elements(cache.len() as u64));
    group.bench_function("sort_and_scan", |b| {
        b.iter(|| {
            let mut pending = PendingQueue::new();
            for chunk in cache.iter() {
                pending.push(Arc::clone(chunk));
            }
            pending.sort_farthest_first(reference);
            black_box(pending.promote_back_to_front(|chunk| cache.neighborhood(chunk.position()).is_some()))
        });
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = benchmark_neighborhood,
              benchmark_local_view,
              benchmark_pending_scan
}

criterion_main!(benches);
