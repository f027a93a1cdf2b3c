//! # Streaming Simulation
//!
//! A fake server thread streams terrain chunks in random-ish order around
//! a viewer walking along +x, sometimes re-sending or invalidating chunks.
//! The main thread runs the update cycle at 60 Hz and prints a report.
//!
//! Usage: `stream_sim [config.toml]`
//!
//! Target: every chunk inside the view radius ready within 2 seconds of
//! the viewer arriving.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tessera_chunk::{Block, Chunk, DefaultBlockProvider};
use tessera_shared::{chunk_origin, IVec3, Region3, Vec3, CHUNK_SIZE};
use tessera_streaming::{ChannelEventSink, RemoteChunkProvider, StreamingConfig, WorldEvent};

/// Chunk radius the server keeps populated around the viewer.
const VIEW_RADIUS: i32 = 3;
/// Simulated frames.
const FRAMES: u32 = 600;
/// Viewer speed in blocks per frame.
const SPEED: f32 = 0.25;

/// Ground height at a world column.
fn ground_height(x: i32, z: i32) -> i32 {
    ((x / 3 + z / 5).rem_euclid(12)) - 4
}

fn terrain_chunk(position: IVec3) -> Chunk {
    let origin = chunk_origin(position);
    let blocks = Region3::new(IVec3::ZERO, CHUNK_SIZE)
        .iter()
        .map(|local| {
            let world = origin + local;
            if world.y < ground_height(world.x, world.z) {
                Block::STONE
            } else if world.y == ground_height(world.x, world.z) && world.x % 11 == 0 {
                Block::TORCH
            } else {
                Block::AIR
            }
        })
        .collect();
    Chunk::from_blocks(position, blocks).unwrap_or_else(|_| Chunk::new(position))
}

/// Cheap deterministic shuffle.
fn scramble(positions: &mut [IVec3], seed: u64) {
    let mut state = seed | 1;
    for i in (1..positions.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        #[allow(clippy::cast_possible_truncation)]
        let j = (state % (i as u64 + 1)) as usize;
        positions.swap(i, j);
    }
}

fn viewer_at(frame: u32) -> Vec3 {
    #[allow(clippy::cast_precision_loss)]
    let x = frame as f32 * SPEED;
    Vec3::new(x, 8.0, 8.0)
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match StreamingConfig::from_toml_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                std::process::exit(2);
            }
        },
        None => StreamingConfig::default(),
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║               TESSERA - REMOTE CHUNK STREAMING SIM               ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║  post-process threads: {:<4}  merge threads: {:<4}                 ║", config.post_process_threads, config.merge_threads);
    println!("║  view radius: {VIEW_RADIUS} chunks    frames: {FRAMES}                            ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");

    let mut provider = match RemoteChunkProvider::with_config(config, Arc::new(DefaultBlockProvider)) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Failed to start provider: {e}");
            std::process::exit(1);
        }
    };
    let (sink, events) = ChannelEventSink::bounded(65_536);
    provider.set_world_event_sink(sink);
    provider.subscribe(|_pos: IVec3| {});

    // Fake server: streams chunks around wherever the viewer is heading
    let running = Arc::new(AtomicBool::new(true));
    let producer = provider.producer();
    let server_running = Arc::clone(&running);
    let server = thread::spawn(move || {
        let mut sent: HashSet<IVec3> = HashSet::new();
        let mut frame = 0u32;
        while server_running.load(Ordering::Relaxed) && frame < FRAMES {
            let center = tessera_shared::chunk_pos_of_world(viewer_at(frame + 30));
            let mut wanted: Vec<IVec3> = Region3::from_center_extents(center, IVec3::splat(VIEW_RADIUS))
                .iter()
                .filter(|pos| !sent.contains(pos))
                .collect();
            scramble(&mut wanted, u64::from(frame));
            for position in wanted {
                if producer.receive_chunk(terrain_chunk(position)).is_err() {
                    return sent.len();
                }
                sent.insert(position);
            }
            // Occasionally the server changes its mind about a chunk
            if frame % 97 == 0 {
                let target = center + IVec3::new(VIEW_RADIUS, 0, 0);
                if sent.contains(&target) {
                    let _ = producer.invalidate(target);
                    let _ = producer.receive_chunk(terrain_chunk(target));
                }
            }
            frame += 10;
            thread::sleep(Duration::from_millis(150));
        }
        sent.len()
    });

    let start = Instant::now();
    let mut loaded = 0u64;
    let mut unloaded = 0u64;
    let mut worst_cycle = Duration::ZERO;

    for frame in 0..FRAMES {
        let cycle_start = Instant::now();
        provider.set_reference_point(viewer_at(frame));
        provider.begin_update();
        provider.complete_update();
        worst_cycle = worst_cycle.max(cycle_start.elapsed());

        for event in events.try_iter() {
            match event {
                WorldEvent::ChunkLoaded(_) => loaded += 1,
                WorldEvent::BeforeChunkUnload(_) => unloaded += 1,
            }
        }
        thread::sleep(Duration::from_millis(16));
    }

    running.store(false, Ordering::Relaxed);
    let sent = server.join().unwrap_or(0);

    let viewer_chunk = tessera_shared::chunk_pos_of_world(viewer_at(FRAMES));
    let view = provider.build_local_view(viewer_chunk);
    let stats = provider.stats();
    provider.dispose();

    println!();
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  RESULTS ({:.2}s wall clock)", start.elapsed().as_secs_f64());
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Chunks sent:          {sent}");
    println!("  Cached / ready:       {} / {}", stats.cached, stats.ready);
    println!("  Pending / merging:    {} / {}", stats.pending, stats.merging);
    println!("  ChunkLoaded events:   {loaded}");
    println!("  Unload events:        {unloaded}");
    println!("  Replacements:         {}", stats.replacements);
    println!("  Deferred evictions:   {}", stats.deferred_evictions);
    println!("  Discarded merges:     {}", stats.discarded_merges);
    println!("  Failed merges:        {}", stats.failed_merges);
    println!("  Dropped handoffs:     {}", stats.dropped_handoffs);
    println!("  Post-process tasks:   {:?}", stats.post_process);
    println!("  Merge jobs:           {:?}", stats.merge);
    println!("  Worst update cycle:   {:.3}ms", worst_cycle.as_secs_f64() * 1000.0);
    println!(
        "  Local view at viewer: {}",
        if view.is_some() { "AVAILABLE" } else { "MISSING" }
    );
    println!("═══════════════════════════════════════════════════════════════════");

    if stats.promotions == 0 {
        std::process::exit(1);
    }
}
