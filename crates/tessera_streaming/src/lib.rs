//! # TESSERA Streaming
//!
//! Client-side streaming of remote chunks into a coherent, query-able cache.
//!
//! ## Design Principles
//!
//! 1. **Non-blocking intake**: network threads only queue work
//! 2. **Nearest first**: every queue is ordered by distance to the viewer
//! 3. **No partial neighborhoods**: a chunk becomes visible only after all
//!    26 neighbors are cached and its border light is merged
//! 4. **Single owner**: cache state lives on the consumer thread, no locks
//!
//! ## Core Components
//!
//! - `ChunkProducer`: cloneable intake handle (`receive_chunk`, `invalidate`)
//! - `TaskPipeline`: proximity-ordered worker pool
//! - `NeighborMerger`: two-phase neighbor light merge
//! - `RemoteChunkProvider`: cache, promotion and queries
//! - `RegionView`: snapshot over a box of chunks
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_streaming::{RemoteChunkProvider, WorldEvent};
//!
//! let mut provider = RemoteChunkProvider::new()?;
//! provider.subscribe(|pos| println!("chunk {pos} ready"));
//!
//! let producer = provider.producer();
//! std::thread::spawn(move || {
//!     for chunk in network_chunks() {
//!         producer.receive_chunk(chunk).ok();
//!     }
//! });
//!
//! loop {
//!     provider.set_reference_point(player_position());
//!     provider.begin_update();
//!     // ... simulate, render ...
//!     provider.complete_update();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod handoff;
pub mod merger;
pub mod pending;
pub mod pipeline;
pub mod provider;
pub mod relevance;
pub mod stats;
pub mod view;

pub use cache::ChunkCache;
pub use config::StreamingConfig;
pub use error::{StreamingError, StreamingResult, TaskError};
pub use events::{
    ChannelEventSink, ChunkReadyListener, NoopObserver, NullEventSink, StreamingObserver, WorldEvent,
    WorldEventSink,
};
pub use handoff::{ChunkProducer, HandoffSender, InvalidationSet, PostProcessTask, ReadyBuffer};
pub use merger::{MergeFailure, MergeHandle, NeighborMerger};
pub use pending::PendingQueue;
pub use pipeline::{PipelineStats, PipelineTask, TaskPipeline};
pub use provider::RemoteChunkProvider;
pub use relevance::{ready_score, task_score, ReferencePoint};
pub use stats::StreamingStats;
pub use view::RegionView;
