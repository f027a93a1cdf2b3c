//! # Collaborator Interfaces
//!
//! What the streaming core tells the rest of the client:
//!
//! ```text
//! complete_update ──> ChunkReadyListener::on_chunk_ready(pos)
//!                 ──> WorldEventSink::send(ChunkLoaded(pos))
//! eviction        ──> WorldEventSink::send(BeforeChunkUnload(pos))
//! everything      ──> StreamingObserver (diagnostics, no-op by default)
//! ```
//!
//! All of these run on the consumer thread. Sink errors are logged and never
//! abort the state transition that produced the event.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tessera_shared::IVec3;

use crate::error::{StreamingError, StreamingResult};

// ============================================================================
// WORLD EVENTS
// ============================================================================

/// Events sent to the world entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorldEvent {
    /// A chunk was promoted and is now visible.
    ChunkLoaded(IVec3),
    /// A chunk is about to be disposed.
    BeforeChunkUnload(IVec3),
}

impl WorldEvent {
    /// Chunk the event is about.
    #[must_use]
    pub const fn position(self) -> IVec3 {
        match self {
            Self::ChunkLoaded(pos) | Self::BeforeChunkUnload(pos) => pos,
        }
    }
}

/// Receiver of world events.
pub trait WorldEventSink: Send {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Implementations report delivery failures; the provider only logs them.
    fn send(&self, event: WorldEvent) -> StreamingResult<()>;
}

/// Sink that discards every event. Used until a world entity is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEventSink;

impl WorldEventSink for NullEventSink {
    fn send(&self, _event: WorldEvent) -> StreamingResult<()> {
        Ok(())
    }
}

/// Sink forwarding events over a bounded crossbeam channel.
#[derive(Clone, Debug)]
pub struct ChannelEventSink {
    sender: Sender<WorldEvent>,
}

impl ChannelEventSink {
    /// Creates a sink and the receiver its events arrive on.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<WorldEvent>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl WorldEventSink for ChannelEventSink {
    fn send(&self, event: WorldEvent) -> StreamingResult<()> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => StreamingError::EventSinkFull,
            TrySendError::Disconnected(_) => StreamingError::EventSinkClosed,
        })
    }
}

// ============================================================================
// READINESS LISTENER
// ============================================================================

/// Told about every promotion, exactly once per chunk.
pub trait ChunkReadyListener: Send {
    /// Called after the chunk at `position` became ready.
    fn on_chunk_ready(&mut self, position: IVec3);
}

impl<F> ChunkReadyListener for F
where
    F: FnMut(IVec3) + Send,
{
    fn on_chunk_ready(&mut self, position: IVec3) {
        self(position);
    }
}

// ============================================================================
// OBSERVER
// ============================================================================

/// Diagnostics hooks. Every method defaults to doing nothing.
pub trait StreamingObserver: Send + Sync {
    /// The provider finished construction.
    fn provider_initialized(&self) {}

    /// The provider was disposed.
    fn provider_disposed(&self) {}

    /// A pending chunk had its full neighborhood and began merging.
    fn merge_started(&self, _position: IVec3) {}

    /// A chunk became ready.
    fn chunk_promoted(&self, _position: IVec3) {}

    /// A chunk was removed from the cache and disposed.
    fn chunk_evicted(&self, _position: IVec3) {}

    /// A finished merge was thrown away (chunk replaced or evicted meanwhile).
    fn merge_discarded(&self, _position: IVec3) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl StreamingObserver for NoopObserver {}
