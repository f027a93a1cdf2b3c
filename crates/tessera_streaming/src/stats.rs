//! Streaming diagnostics.

use crate::pipeline::PipelineStats;

/// Snapshot of the provider's state and lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
    /// Chunks in the cache (ready or not).
    pub cached: usize,
    /// Ready chunks in the cache.
    pub ready: usize,
    /// Chunks waiting for their neighborhood.
    pub pending: usize,
    /// Chunks with a merge in flight.
    pub merging: usize,
    /// Chunks post-processed and waiting in the ready queue.
    pub handoff_queued: usize,
    /// Chunks promoted to ready.
    pub promotions: u64,
    /// Chunks evicted and disposed.
    pub evictions: u64,
    /// Chunks replaced by a newer delivery.
    pub replacements: u64,
    /// Evictions postponed because a merge was in flight.
    pub deferred_evictions: u64,
    /// Finished merges thrown away.
    pub discarded_merges: u64,
    /// Merges that failed or were cancelled.
    pub failed_merges: u64,
    /// Post-processed chunks dropped at the handoff.
    pub dropped_handoffs: u64,
    /// Post-process pool.
    pub post_process: PipelineStats,
    /// Merge pool.
    pub merge: PipelineStats,
}

/// Counters owned by the consumer.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Counters {
    pub promotions: u64,
    pub evictions: u64,
    pub replacements: u64,
    pub deferred_evictions: u64,
    pub discarded_merges: u64,
}
