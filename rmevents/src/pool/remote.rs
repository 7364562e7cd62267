use std::sync::Arc;

use crate::bail;
use crate::concurrency::queue::QueueTail;
use crate::error::{ErrorKind, StreamResult};
use crate::message::{MessageArena, MessageHandle, MessageId, MessageState};

/// Releasing half of a message pool, owned by one handler.
///
/// A message is sent back only after both of its uses let go of it: the handler queue it
/// arrived on, and the handler that processed it. Both releases happen on the owning
/// handler thread.
#[derive(Debug)]
pub struct RemoteSide {
    arena: Arc<MessageArena>,
    /// Return queue tails indexed by origin pool.
    returns: Vec<QueueTail>,
}

impl RemoteSide {
    pub(crate) fn new(arena: Arc<MessageArena>, returns: Vec<QueueTail>) -> Self {
        Self { arena, returns }
    }

    /// Records that the handler queue no longer references `id`.
    pub fn release_queue_stub(&mut self, id: MessageId) -> StreamResult<()> {
        if self.arena.record_release(id)? {
            self.release_message(MessageHandle::claim(id))?;
        }

        Ok(())
    }

    /// Records that the handler is done with `handle`.
    ///
    /// If the queue still uses the object as its stub, ownership passes to the queue and the
    /// object is sent on the next [`RemoteSide::release_queue_stub`].
    pub fn release_handled(&mut self, handle: MessageHandle) -> StreamResult<()> {
        if self.arena.record_release(handle.id())? {
            self.release_message(handle)?;
        }

        Ok(())
    }

    /// Sends a message back to the pool it was allocated by.
    fn release_message(&mut self, handle: MessageHandle) -> StreamResult<()> {
        let origin = self.arena.message(&handle).origin();
        let Some(tail) = self.returns.get_mut(origin as usize) else {
            bail!(
                ErrorKind::InvalidState,
                "Message has no return queue for its origin pool",
                format!("message {} has origin {origin}", handle.id())
            );
        };

        self.arena.transition(
            handle.id(),
            &[MessageState::InTransit, MessageState::Accumulating],
            MessageState::Returning,
        );
        tail.enqueue(handle);

        Ok(())
    }
}
