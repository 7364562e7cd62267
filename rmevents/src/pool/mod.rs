//! Message recycling between the listener and the handlers.
//!
//! The allocating thread owns an [`AllocSide`] and every handler owns a [`RemoteSide`].
//! Spent messages travel back through one point-to-point return queue per handler, so the
//! two sides never share an allocator.

mod alloc;
mod remote;

use std::sync::Arc;

pub use alloc::{AllocSide, PoolStats};
pub use remote::RemoteSide;

use crate::concurrency::queue::{self, QueueHead, QueueTail};
use crate::error::StreamResult;
use crate::message::{MessageArena, MessageState};

/// Creates the return queues between the pool with index `origin` and `handlers` handlers.
///
/// Each queue gets a fresh sentinel from the arena. The sentinel is handed out by the
/// [`AllocSide`] once the first returned message passes it.
pub fn return_channels(
    arena: &Arc<MessageArena>,
    origin: u16,
    handlers: usize,
) -> StreamResult<(AllocSide, Vec<RemoteSide>)> {
    let mut heads = Vec::with_capacity(handlers);
    let mut remotes = Vec::with_capacity(handlers);

    for _ in 0..handlers {
        let sentinel = arena.allocate(origin)?;
        arena.transition(
            sentinel.id(),
            &[MessageState::InTransit],
            MessageState::Returning,
        );

        let (tail, head) = queue::channel(Arc::clone(arena), sentinel);
        heads.push(head);
        remotes.push(RemoteSide::new(Arc::clone(arena), vec![tail]));
    }

    Ok((AllocSide::new(Arc::clone(arena), origin, heads), remotes))
}

/// Creates the queue carrying fragments from the pool with index `origin` to one handler.
///
/// The sentinel has one release recorded up front: it is only ever released by the queue,
/// never by the accumulator.
pub fn delivery_channel(
    arena: &Arc<MessageArena>,
    origin: u16,
) -> StreamResult<(QueueTail, QueueHead)> {
    let sentinel = arena.allocate(origin)?;
    arena.reset_releases(sentinel.id(), 1);

    Ok(queue::channel(Arc::clone(arena), sentinel))
}
