use std::sync::Arc;

use metrics::counter;

use crate::concurrency::queue::QueueHead;
use crate::error::StreamResult;
use crate::message::{MessageArena, MessageHandle, MessageState};
use crate::metrics::{RMEVENTS_MESSAGES_ALLOCATED_TOTAL, RMEVENTS_MESSAGES_RECYCLED_TOTAL};

/// Allocation counters of one [`AllocSide`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects taken from the unused part of the arena.
    pub fresh: u64,
    /// Objects reused from a return queue.
    pub recycled: u64,
}

/// Allocating half of a message pool.
///
/// Prefers returned objects, scanning the return queues round-robin starting after the
/// queue that produced the last one. Falls back to the arena when every queue is empty.
#[derive(Debug)]
pub struct AllocSide {
    arena: Arc<MessageArena>,
    origin: u16,
    returns: Vec<QueueHead>,
    cursor: usize,
    spare: Option<MessageHandle>,
    stats: PoolStats,
}

impl AllocSide {
    pub(crate) fn new(arena: Arc<MessageArena>, origin: u16, returns: Vec<QueueHead>) -> Self {
        let cursor = returns.len().saturating_sub(1);
        Self {
            arena,
            origin,
            returns,
            cursor,
            spare: None,
            stats: PoolStats::default(),
        }
    }

    /// Returns a message object ready to be reinitialized. Never blocks.
    ///
    /// A returned object is only handed out once its return queue has moved past it, so
    /// the handler that released it can no longer reach it.
    pub fn get_message(&mut self) -> StreamResult<MessageHandle> {
        if let Some(spare) = self.spare.take() {
            return Ok(spare);
        }

        let queues = self.returns.len();
        for step in 1..=queues {
            let index = (self.cursor + step) % queues;
            if let Some(handle) = self.returns[index].advance() {
                self.cursor = index;
                self.arena.transition(
                    handle.id(),
                    &[MessageState::Returning],
                    MessageState::InTransit,
                );
                self.arena.reset_releases(handle.id(), 0);

                self.stats.recycled += 1;
                counter!(RMEVENTS_MESSAGES_RECYCLED_TOTAL).increment(1);

                return Ok(handle);
            }
        }

        let handle = self.arena.allocate(self.origin)?;
        self.arena.reset_releases(handle.id(), 0);

        self.stats.fresh += 1;
        counter!(RMEVENTS_MESSAGES_ALLOCATED_TOTAL).increment(1);

        Ok(handle)
    }

    /// Keeps an object that was taken but never sent, for the next [`AllocSide::get_message`].
    pub fn put_back(&mut self, handle: MessageHandle) {
        debug_assert!(self.spare.is_none());
        self.spare = Some(handle);
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
