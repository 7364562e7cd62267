//! Single-producer, single-consumer unbounded linked queue of message objects.
//!
//! The queue always holds one stub message: the last one dequeued, or the sentinel it was
//! created with. Producer and consumer never touch the same link field except through the
//! stub's link, which the producer writes once and the consumer reads.
//!
//! Ownership of the two ends enforces the contract: [`QueueTail`] and [`QueueHead`] are not
//! `Clone`, so exactly one thread can enqueue and exactly one can dequeue.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::concurrency::barrier;
use crate::message::{MessageArena, MessageHandle, MessageId, NIL};

/// Creates a queue around `sentinel`, which becomes the initial stub.
pub fn channel(arena: Arc<MessageArena>, sentinel: MessageHandle) -> (QueueTail, QueueHead) {
    let stub = sentinel.id();
    arena.queue_link(stub).store(NIL, Ordering::Relaxed);

    let tail = QueueTail {
        arena: Arc::clone(&arena),
        tail: stub,
    };
    let head = QueueHead { arena, head: stub };

    (tail, head)
}

/// Producer end of a queue.
#[derive(Debug)]
pub struct QueueTail {
    arena: Arc<MessageArena>,
    tail: MessageId,
}

impl QueueTail {
    /// Publishes a message. The producer gives up all access to it.
    pub fn enqueue(&mut self, message: MessageHandle) {
        let id = message.id();
        self.arena.queue_link(id).store(NIL, Ordering::Relaxed);

        // The payload and the cleared link must be visible before the message is reachable.
        barrier::store_store();
        self.arena
            .queue_link(self.tail)
            .store(id.raw(), Ordering::Relaxed);

        self.tail = id;
    }
}

/// A message taken off a queue.
#[derive(Debug)]
pub struct Dequeued {
    /// The dequeued message. It stays the queue's stub until the next dequeue, which only
    /// reads its link field.
    pub message: MessageHandle,
    /// The previous stub, which the queue no longer references.
    pub previous_stub: MessageId,
}

/// Consumer end of a queue.
#[derive(Debug)]
pub struct QueueHead {
    arena: Arc<MessageArena>,
    head: MessageId,
}

impl QueueHead {
    /// Returns `true` when the next [`QueueHead::dequeue`] would return nothing.
    pub fn is_empty(&self) -> bool {
        self.next() == NIL
    }

    /// Takes the next message, or returns [`None`] without blocking.
    pub fn dequeue(&mut self) -> Option<Dequeued> {
        let next = self.next();
        if next == NIL {
            return None;
        }

        let previous_stub = self.head;
        self.head = MessageId::from_raw(next);

        Some(Dequeued {
            message: MessageHandle::claim(self.head),
            previous_stub,
        })
    }

    /// Advances past the next message and hands out the previous stub instead.
    ///
    /// Used by pools, which care about getting a free object rather than about its content.
    /// The handed-out object is one the producer and this queue are both done with.
    pub(crate) fn advance(&mut self) -> Option<MessageHandle> {
        let next = self.next();
        if next == NIL {
            return None;
        }

        let previous_stub = self.head;
        self.head = MessageId::from_raw(next);

        Some(MessageHandle::claim(previous_stub))
    }

    /// Current stub of the queue.
    pub fn stub(&self) -> MessageId {
        self.head
    }

    /// Discards everything still queued and returns how many messages were dropped along
    /// with the last stub.
    ///
    /// Only meant for teardown, once the producer thread has exited.
    pub fn flush(&mut self) -> (usize, MessageId) {
        let mut discarded = 0;
        while self.dequeue().is_some() {
            discarded += 1;
        }

        (discarded, self.head)
    }

    fn next(&self) -> u32 {
        self.arena.queue_link(self.head).load(Ordering::Acquire)
    }
}
