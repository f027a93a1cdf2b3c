//! # Remote Chunk Provider
//!
//! The consumer-side facade. Owns the cache, the pending queue, the set of
//! chunks mid-merge and the deferred evictions; every mutation goes through
//! `&mut self` on the consumer thread.
//!
//! ## Update Cycle
//!
//! ```text
//! begin_update:
//!   1. viewer changed chunk?    -> re-key queued post-process and merge jobs
//!   2. drain invalidations      -> evict (or defer if mid-merge)
//!   3. drain ready queue        -> install, replacing superseded entries
//!   4. sort pending farthest-first, scan back to front:
//!        all 26 neighbors cached -> begin merge, leave the pending queue
//!
//! complete_update:
//!   5. poll merges              -> same chunk still cached? mark ready,
//!                                  on_chunk_ready + ChunkLoaded
//! ```
//!
//! ## Eviction Guard
//!
//! | state when invalidated     | result                                          |
//! |----------------------------|-------------------------------------------------|
//! | pending (not merging)      | removed, `BeforeChunkUnload`, disposed          |
//! | mid-merge                  | deferred; on completion discarded and unloaded  |
//! | ready                      | removed, `BeforeChunkUnload`, disposed          |
//!
//! A ready chunk stays ready when a neighbor is evicted later.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tessera_chunk::{BlockProvider, Chunk, ChunkId, DefaultBlockProvider};
use tessera_shared::{chunk_region_around_block, IVec3, Region3, Vec3};

use crate::cache::ChunkCache;
use crate::config::StreamingConfig;
use crate::error::StreamingResult;
use crate::events::{
    ChunkReadyListener, NoopObserver, NullEventSink, StreamingObserver, WorldEvent, WorldEventSink,
};
use crate::handoff::{ChunkProducer, ReadyBuffer};
use crate::merger::{MergeFailure, NeighborMerger};
use crate::pending::PendingQueue;
use crate::pipeline::TaskPipeline;
use crate::relevance::{task_score, ReferencePoint};
use crate::stats::{Counters, StreamingStats};
use crate::view::RegionView;

/// Streams remote chunks into a local cache and promotes them once their
/// neighborhood is present and light-merged.
pub struct RemoteChunkProvider {
    config: StreamingConfig,
    cache: ChunkCache,
    pending: PendingQueue,
    /// Chunks whose merge has begun but not been consumed.
    merging: HashSet<ChunkId>,
    /// Mid-merge chunks invalidated meanwhile.
    deferred: HashSet<ChunkId>,
    merger: NeighborMerger<Arc<Chunk>>,
    post_process: Arc<TaskPipeline>,
    buffer: ReadyBuffer,
    producer: ChunkProducer,
    reference: ReferencePoint,
    reference_chunk: IVec3,
    listener: Option<Box<dyn ChunkReadyListener>>,
    events: Box<dyn WorldEventSink>,
    observer: Arc<dyn StreamingObserver>,
    blocks: Arc<dyn BlockProvider>,
    counters: Counters,
    disposed: bool,
}

impl std::fmt::Debug for RemoteChunkProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteChunkProvider")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl RemoteChunkProvider {
    /// Creates a provider with the default configuration and built-in air block.
    ///
    /// # Errors
    ///
    /// Fails if a worker pool cannot be started.
    pub fn new() -> StreamingResult<Self> {
        Self::with_config(StreamingConfig::default(), Arc::new(DefaultBlockProvider))
    }

    /// Creates a provider.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a bad configuration, `WorkerSpawn` if a
    /// worker pool cannot be started.
    pub fn with_config(config: StreamingConfig, blocks: Arc<dyn BlockProvider>) -> StreamingResult<Self> {
        config.validate()?;

        let post_process = Arc::new(TaskPipeline::new("chunk-post", config.post_process_threads)?);
        let merger = NeighborMerger::new(config.merge_threads)?;
        let (handoff, invalidations, buffer) =
            ReadyBuffer::new(config.ready_queue_capacity, config.handoff_timeout());
        let reference = ReferencePoint::default();
        let producer = ChunkProducer::new(
            Arc::clone(&post_process),
            handoff,
            invalidations,
            reference.clone(),
        );

        tracing::info!(
            post_process_threads = config.post_process_threads,
            merge_threads = config.merge_threads,
            ready_queue_capacity = config.ready_queue_capacity,
            "remote chunk provider initialized"
        );

        Ok(Self {
            config,
            cache: ChunkCache::new(),
            pending: PendingQueue::new(),
            merging: HashSet::new(),
            deferred: HashSet::new(),
            merger,
            post_process,
            buffer,
            producer,
            reference_chunk: reference.chunk(),
            reference,
            listener: None,
            events: Box::new(NullEventSink),
            observer: Arc::new(NoopObserver),
            blocks,
            counters: Counters::default(),
            disposed: false,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &StreamingConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------------

    /// Handle for network threads delivering chunks and invalidations.
    #[must_use]
    pub fn producer(&self) -> ChunkProducer {
        self.producer.clone()
    }

    /// Accepts a chunk. Same as `producer().receive_chunk(chunk)`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineShutDown` after `dispose`.
    pub fn receive_chunk(&self, chunk: Chunk) -> StreamingResult<()> {
        self.producer.receive_chunk(chunk)
    }

    /// Requests removal of a chunk. Same as `producer().invalidate(position)`.
    ///
    /// # Errors
    ///
    /// Never fails while the provider is alive.
    pub fn invalidate(&self, position: IVec3) -> StreamingResult<()> {
        self.producer.invalidate(position)
    }

    /// Sets the readiness listener. Updates do nothing until one is set.
    pub fn subscribe(&mut self, listener: impl ChunkReadyListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Sets the world-event sink.
    pub fn set_world_event_sink(&mut self, sink: impl WorldEventSink + 'static) {
        self.events = Box::new(sink);
    }

    /// Installs a diagnostics observer and reports the provider as initialized to it.
    pub fn set_observer(&mut self, observer: Arc<dyn StreamingObserver>) {
        observer.provider_initialized();
        self.observer = observer;
    }

    /// Moves the viewer. Takes effect for scoring immediately.
    pub fn set_reference_point(&mut self, position: Vec3) {
        self.reference.set(position);
    }

    /// Current viewer position.
    #[must_use]
    pub fn reference_point(&self) -> Vec3 {
        self.reference.get()
    }

    // ------------------------------------------------------------------------
    // Update cycle
    // ------------------------------------------------------------------------

    /// First half of a cycle: evictions, installs and promotion attempts.
    ///
    /// Does nothing until a listener has subscribed.
    pub fn begin_update(&mut self) {
        if self.disposed || self.listener.is_none() {
            return;
        }
        self.follow_reference();
        self.check_for_unload();
        self.make_chunks_available();
    }

    /// Second half of a cycle: promotes every chunk whose merge has finished.
    pub fn complete_update(&mut self) {
        if self.disposed {
            return;
        }

        for chunk in self.merger.complete_merge() {
            let position = chunk.position();
            self.merging.remove(&chunk.id());
            let deferred = self.deferred.remove(&chunk.id());

            if !self.cache.holds(&chunk) {
                tracing::debug!(chunk = %position, id = chunk.id().raw(), "discarding merge of superseded chunk");
                self.discard_merge(position);
                continue;
            }
            if deferred {
                tracing::debug!(chunk = %position, "applying deferred eviction");
                self.discard_merge(position);
                self.cache.remove(position);
                self.unload(&chunk);
                continue;
            }
            if chunk.mark_ready() {
                self.counters.promotions += 1;
                tracing::trace!(chunk = %position, "chunk ready");
                if let Some(listener) = self.listener.as_mut() {
                    listener.on_chunk_ready(position);
                }
                self.send_event(WorldEvent::ChunkLoaded(position));
                self.observer.chunk_promoted(position);
            }
        }

        for failure in self.merger.take_failures() {
            self.handle_merge_failure(&failure);
        }
    }

    /// A failed merge never installs light: the chunk stays unready and, if it is
    /// still the cached entry and still usable, goes back to the pending queue.
    fn handle_merge_failure(&mut self, failure: &MergeFailure) {
        self.merging.remove(&failure.id);
        let deferred = self.deferred.remove(&failure.id);
        let Some(chunk) = self
            .cache
            .get(failure.position)
            .filter(|cached| cached.id() == failure.id)
            .cloned()
        else {
            // Replaced while merging; the failure is moot.
            self.discard_merge(failure.position);
            return;
        };
        if deferred {
            self.cache.remove(failure.position);
            self.unload(&chunk);
        } else if !chunk.is_disposed() && !chunk.is_ready() {
            tracing::debug!(chunk = %failure.position, "merge failed, chunk queued for another attempt");
            self.pending.push(chunk);
        } else {
            tracing::debug!(chunk = %failure.position, "merge failed, chunk left stale");
        }
    }

    fn follow_reference(&mut self) {
        let current = self.reference.chunk();
        if current == self.reference_chunk {
            return;
        }
        self.reference_chunk = current;
        self.post_process.rescore(|position| position.distance_squared(current));
        self.merger.rescore(|position| position.distance_squared(current));
        tracing::trace!(chunk = %current, "viewer changed chunk, queued work re-keyed");
    }

    fn check_for_unload(&mut self) {
        for position in self.buffer.drain_invalidations() {
            self.evict(position);
        }
    }

    fn evict(&mut self, position: IVec3) {
        let Some(chunk) = self.cache.get(position).cloned() else {
            tracing::trace!(chunk = %position, "invalidation for uncached chunk");
            return;
        };
        if self.merging.contains(&chunk.id()) {
            if self.deferred.insert(chunk.id()) {
                self.counters.deferred_evictions += 1;
                tracing::debug!(chunk = %position, "eviction deferred until merge completes");
            }
            return;
        }
        self.cache.remove(position);
        self.pending.remove(chunk.id());
        self.unload(&chunk);
    }

    fn unload(&mut self, chunk: &Chunk) {
        let position = chunk.position();
        self.send_event(WorldEvent::BeforeChunkUnload(position));
        chunk.dispose();
        self.counters.evictions += 1;
        self.observer.chunk_evicted(position);
    }

    fn discard_merge(&mut self, position: IVec3) {
        self.counters.discarded_merges += 1;
        self.observer.merge_discarded(position);
    }

    fn make_chunks_available(&mut self) {
        for chunk in self.buffer.drain_ready() {
            let chunk = Arc::new(chunk);
            if let Some(old) = self.cache.insert(Arc::clone(&chunk)) {
                self.pending.remove(old.id());
                old.dispose();
                self.counters.replacements += 1;
                tracing::debug!(chunk = %chunk.position(), "replaced cached chunk");
            }
            self.pending.push(chunk);
        }

        if self.pending.is_empty() {
            return;
        }

        let reference = self.reference.get();
        self.pending.sort_farthest_first(reference);

        let Self {
            pending,
            cache,
            merger,
            merging,
            observer,
            ..
        } = self;
        pending.promote_back_to_front(|chunk| {
            let position = chunk.position();
            let Some(neighborhood) = cache.neighborhood(position) else {
                return false;
            };
            let priority = task_score(position, reference);
            match merger.begin_merge(Arc::clone(chunk), neighborhood, Arc::clone(chunk), priority) {
                Ok(()) => {
                    merging.insert(chunk.id());
                    observer.merge_started(position);
                    true
                }
                Err(error) => {
                    tracing::warn!(chunk = %position, %error, "could not begin merge");
                    false
                }
            }
        });
    }

    fn send_event(&self, event: WorldEvent) {
        if let Err(error) = self.events.send(event) {
            tracing::warn!(?event, %error, "world event not delivered");
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// The chunk at `position` if it is cached and ready.
    #[must_use]
    pub fn get_ready_chunk(&self, position: IVec3) -> Option<Arc<Chunk>> {
        self.cache.ready(position).cloned()
    }

    /// Returns true if the chunk at `position` is cached and ready.
    #[must_use]
    pub fn is_ready(&self, position: IVec3) -> bool {
        self.cache.ready(position).is_some()
    }

    /// The chunk at `position` if it is cached, ready or not. For diagnostics.
    #[must_use]
    pub fn get_unready_chunk(&self, position: IVec3) -> Option<Arc<Chunk>> {
        self.cache.get(position).cloned()
    }

    /// View of `center ± local extents`, view origin at the center chunk's origin.
    #[must_use]
    pub fn build_local_view(&self, center: IVec3) -> Option<RegionView> {
        let extents = self.config.local_extents();
        self.build_view(Region3::from_center_extents(center, extents), extents)
    }

    /// World-space view of every chunk touching the blocks within `extent` of `block`.
    ///
    /// `None` for a negative extent.
    #[must_use]
    pub fn build_view_around_world_point(&self, block: IVec3, extent: i32) -> Option<RegionView> {
        if extent < 0 {
            return None;
        }
        let region = chunk_region_around_block(block, extent);
        self.build_view(region, -region.min())
    }

    /// World-space view of `center ± local extents`.
    #[must_use]
    pub fn build_view_around_chunk(&self, center: IVec3) -> Option<RegionView> {
        let region = Region3::from_center_extents(center, self.config.local_extents());
        self.build_view(region, -region.min())
    }

    fn build_view(&self, region: Region3, offset: IVec3) -> Option<RegionView> {
        RegionView::build(region, offset, self.blocks.air(), |position| {
            self.cache.get(position).cloned()
        })
    }

    /// Snapshot of sizes and counters.
    #[must_use]
    pub fn stats(&self) -> StreamingStats {
        StreamingStats {
            cached: self.cache.len(),
            ready: self.cache.ready_count(),
            pending: self.pending.len(),
            merging: self.merging.len(),
            handoff_queued: self.buffer.ready_len(),
            promotions: self.counters.promotions,
            evictions: self.counters.evictions,
            replacements: self.counters.replacements,
            deferred_evictions: self.counters.deferred_evictions,
            discarded_merges: self.counters.discarded_merges,
            failed_merges: self.merger.failed_merges(),
            dropped_handoffs: self.buffer.dropped_handoffs(),
            post_process: self.post_process.stats(),
            merge: self.merger.stats(),
        }
    }

    /// Waits until no post-process task is queued or running. Returns false on timeout.
    pub fn wait_post_process_idle(&self, timeout: Duration) -> bool {
        self.post_process.wait_idle(timeout)
    }

    /// Waits until no merge job is queued or running. Returns false on timeout.
    pub fn wait_merges_idle(&self, timeout: Duration) -> bool {
        self.merger.wait_idle(timeout)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Shuts both worker pools down. Queued work is cancelled, running work finishes.
    ///
    /// Later updates do nothing and later deliveries fail with `PipelineShutDown`.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.observer.provider_disposed();
        self.post_process.shutdown();
        self.merger.shutdown();
        tracing::info!(
            cached = self.cache.len(),
            promotions = self.counters.promotions,
            evictions = self.counters.evictions,
            "remote chunk provider disposed"
        );
    }

    /// Returns true once `dispose` has run.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Not supported for remote worlds.
    ///
    /// # Panics
    ///
    /// Always.
    #[allow(clippy::unused_self)]
    pub fn reload_chunk(&mut self, position: IVec3) -> bool {
        panic!("reload_chunk({position}) is not supported by the remote chunk provider")
    }

    /// Not supported for remote worlds.
    ///
    /// # Panics
    ///
    /// Always.
    #[allow(clippy::unused_self)]
    pub fn purge_world(&mut self) {
        panic!("purge_world is not supported by the remote chunk provider")
    }

    /// Not supported for remote worlds.
    ///
    /// # Panics
    ///
    /// Always.
    #[allow(clippy::unused_self)]
    pub fn restart(&mut self) {
        panic!("restart is not supported by the remote chunk provider")
    }

    /// Not supported for remote worlds.
    ///
    /// # Panics
    ///
    /// Always.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn all_chunks(&self) -> Vec<Arc<Chunk>> {
        panic!("all_chunks is not supported by the remote chunk provider")
    }
}

impl Drop for RemoteChunkProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tessera_chunk::Block;
    use tessera_shared::CHUNK_VOLUME;

    use crate::error::StreamingError;
    use crate::events::ChannelEventSink;

    fn air_chunk(position: IVec3) -> Chunk {
        Chunk::from_blocks(position, vec![Block::AIR; CHUNK_VOLUME]).unwrap()
    }

    fn provider() -> RemoteChunkProvider {
        let mut provider =
            RemoteChunkProvider::with_config(StreamingConfig::headless(), Arc::new(DefaultBlockProvider)).unwrap();
        provider.subscribe(|_pos: IVec3| {});
        provider
    }

    /// Delivers chunks and runs begin_update until all of them are cached.
    fn install(provider: &mut RemoteChunkProvider, positions: impl IntoIterator<Item = IVec3>) {
        for position in positions {
            provider.receive_chunk(air_chunk(position)).unwrap();
        }
        assert!(provider.wait_post_process_idle(Duration::from_secs(10)));
        provider.begin_update();
    }

    fn finish_merges(provider: &mut RemoteChunkProvider) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while provider.stats().merging > 0 && Instant::now() < deadline {
            provider.wait_merges_idle(Duration::from_millis(100));
            provider.complete_update();
        }
    }

    #[test]
    fn test_no_listener_means_no_updates() {
        let mut provider =
            RemoteChunkProvider::with_config(StreamingConfig::headless(), Arc::new(DefaultBlockProvider)).unwrap();
        provider.receive_chunk(air_chunk(IVec3::ZERO)).unwrap();
        assert!(provider.wait_post_process_idle(Duration::from_secs(10)));
        provider.begin_update();
        assert_eq!(provider.stats().cached, 0);
        assert_eq!(provider.stats().handoff_queued, 1);
    }

    #[test]
    fn test_isolated_chunk_stays_pending() {
        let mut provider = provider();
        install(&mut provider, [IVec3::ZERO]);
        provider.complete_update();

        assert!(provider.get_unready_chunk(IVec3::ZERO).is_some());
        assert!(provider.get_ready_chunk(IVec3::ZERO).is_none());
        assert_eq!(provider.stats().pending, 1);
        assert_eq!(provider.stats().merging, 0);
    }

    #[test]
    fn test_full_neighborhood_promotes_center_only() {
        let mut provider = provider();
        let (sink, events) = ChannelEventSink::bounded(64);
        provider.set_world_event_sink(sink);

        install(&mut provider, Region3::from_center_extents(IVec3::ZERO, IVec3::ONE).iter());
        assert_eq!(provider.stats().merging, 1);
        finish_merges(&mut provider);

        assert!(provider.is_ready(IVec3::ZERO));
        assert!(!provider.is_ready(IVec3::ONE));
        assert_eq!(events.try_iter().collect::<Vec<_>>(), vec![WorldEvent::ChunkLoaded(IVec3::ZERO)]);
        assert_eq!(provider.stats().promotions, 1);
        assert_eq!(provider.stats().pending, 26);
    }

    #[test]
    fn test_invalidating_pending_chunk_unloads_it() {
        let mut provider = provider();
        let (sink, events) = ChannelEventSink::bounded(64);
        provider.set_world_event_sink(sink);

        install(&mut provider, [IVec3::ZERO]);
        let chunk = provider.get_unready_chunk(IVec3::ZERO).unwrap();
        provider.invalidate(IVec3::ZERO).unwrap();
        provider.begin_update();

        assert!(provider.get_unready_chunk(IVec3::ZERO).is_none());
        assert!(chunk.is_disposed());
        assert_eq!(provider.stats().pending, 0);
        assert_eq!(events.try_recv().unwrap(), WorldEvent::BeforeChunkUnload(IVec3::ZERO));
    }

    #[test]
    fn test_replacement_disposes_old_entry() {
        let mut provider = provider();
        install(&mut provider, [IVec3::ZERO]);
        let first = provider.get_unready_chunk(IVec3::ZERO).unwrap();

        install(&mut provider, [IVec3::ZERO]);
        let second = provider.get_unready_chunk(IVec3::ZERO).unwrap();

        assert_ne!(first.id(), second.id());
        assert!(first.is_disposed());
        assert_eq!(provider.stats().pending, 1);
        assert_eq!(provider.stats().replacements, 1);
    }

    #[test]
    fn test_failed_merge_requeues_live_chunk() {
        let mut provider = provider();
        install(&mut provider, [IVec3::ZERO]);
        let chunk = provider.get_unready_chunk(IVec3::ZERO).unwrap();
        assert!(provider.pending.remove(chunk.id()));
        provider.merging.insert(chunk.id());

        provider.handle_merge_failure(&MergeFailure {
            id: chunk.id(),
            position: IVec3::ZERO,
            error: StreamingError::MergeFailed {
                position: IVec3::ZERO,
                reason: "merge job panicked".to_string(),
            },
        });

        assert_eq!(provider.stats().merging, 0);
        assert_eq!(provider.stats().pending, 1);
        assert!(!chunk.is_ready());
        assert!(!chunk.is_disposed());
        assert!(provider.get_ready_chunk(IVec3::ZERO).is_none());
    }

    #[test]
    fn test_failed_merge_of_deferred_chunk_unloads_it() {
        let mut provider = provider();
        let (sink, events) = ChannelEventSink::bounded(8);
        provider.set_world_event_sink(sink);
        install(&mut provider, [IVec3::ZERO]);
        let chunk = provider.get_unready_chunk(IVec3::ZERO).unwrap();
        assert!(provider.pending.remove(chunk.id()));
        provider.merging.insert(chunk.id());
        provider.deferred.insert(chunk.id());

        provider.handle_merge_failure(&MergeFailure {
            id: chunk.id(),
            position: IVec3::ZERO,
            error: StreamingError::MergeCancelled(IVec3::ZERO),
        });

        assert!(chunk.is_disposed());
        assert!(provider.get_unready_chunk(IVec3::ZERO).is_none());
        assert_eq!(provider.stats().pending, 0);
        assert_eq!(provider.stats().evictions, 1);
        assert_eq!(events.try_recv().unwrap(), WorldEvent::BeforeChunkUnload(IVec3::ZERO));
    }

    #[test]
    fn test_listener_called_once_per_promotion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut provider =
            RemoteChunkProvider::with_config(StreamingConfig::headless(), Arc::new(DefaultBlockProvider)).unwrap();
        let counter = Arc::clone(&calls);
        provider.subscribe(move |_pos: IVec3| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        install(&mut provider, Region3::from_center_extents(IVec3::ZERO, IVec3::ONE).iter());
        finish_merges(&mut provider);
        provider.begin_update();
        provider.complete_update();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_stops_intake() {
        let mut provider = provider();
        provider.dispose();
        assert!(provider.is_disposed());
        assert!(provider.receive_chunk(air_chunk(IVec3::ZERO)).is_err());
        provider.dispose();
    }

    #[test]
    #[should_panic(expected = "not supported")]
    fn test_all_chunks_is_unsupported() {
        let provider = provider();
        let _ = provider.all_chunks();
    }

    #[test]
    #[should_panic(expected = "not supported")]
    fn test_purge_world_is_unsupported() {
        let mut provider = provider();
        provider.purge_world();
    }
}
