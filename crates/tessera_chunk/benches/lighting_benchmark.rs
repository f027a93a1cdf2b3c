//! Benchmark for the light kernels.
//!
//! TARGET: internal lighting plus merge well under 1ms per chunk
//!
//! Run with: cargo bench --package tessera_chunk --bench lighting_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tessera_chunk::{generate_internal_lighting, merge_light, Block, Chunk, Neighborhood};
use tessera_shared::{IVec3, Region3, CHUNK_SIZE, CHUNK_VOLUME};

/// Terrain-like payload: stone below `ground`, air above, a torch every 64 blocks.
fn terrain_blocks(ground: i32) -> Vec<Block> {
    Region3::new(IVec3::ZERO, CHUNK_SIZE)
        .iter()
        .enumerate()
        .map(|(i, pos)| {
            if pos.y < ground {
                Block::STONE
            } else if i % 64 == 0 {
                Block::TORCH
            } else {
                Block::AIR
            }
        })
        .collect()
}

fn benchmark_internal_lighting(c: &mut Criterion) {
    let mut group = c.benchmark_group("internal_lighting");
    group.throughput(Throughput::Elements(1));

    for (name, ground) in [("open_sky", 0), ("half_buried", 8), ("solid", 16)] {
        let blocks = terrain_blocks(ground);
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut chunk = Chunk::from_blocks(IVec3::ZERO, blocks.clone())
                    .unwrap_or_else(|_| Chunk::new(IVec3::ZERO));
                generate_internal_lighting(&mut chunk);
                chunk.deflate();
                black_box(chunk.heap_bytes())
            });
        });
    }

    group.finish();
}

fn benchmark_merge(c: &mut Criterion) {
    let mut hood = Neighborhood::new(IVec3::ZERO);
    for pos in Region3::from_center_extents(IVec3::ZERO, IVec3::ONE).iter() {
        let mut chunk = Chunk::from_blocks(pos, terrain_blocks(8 - pos.y * 4))
            .unwrap_or_else(|_| Chunk::new(pos));
        generate_internal_lighting(&mut chunk);
        hood.insert(Arc::new(chunk));
    }
    let target = hood.get(IVec3::ZERO).cloned().unwrap_or_else(|| Arc::new(Chunk::new(IVec3::ZERO)));

    c.bench_function("merge_light", |b| {
        b.iter(|| black_box(merge_light(&target, &hood).map(|light| light.sunlight.heap_bytes())));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = benchmark_internal_lighting,
              benchmark_merge
}

criterion_main!(benches);

#[test]
fn test_terrain_blocks_fill_chunk() {
    assert_eq!(terrain_blocks(4).len(), CHUNK_VOLUME);
}
