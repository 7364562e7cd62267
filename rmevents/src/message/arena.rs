use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicUsize, Ordering};

use crate::bail;
use crate::error::{ErrorKind, StreamResult};
use crate::message::event::EventMessage;

/// Link value meaning "no message".
pub(crate) const NIL: u32 = u32::MAX;

/// Number of releases after which a message may go back to its pool.
const RELEASES_TO_RECLAIM: u8 = 2;

/// Stable index of a message object inside a [`MessageArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u32);

impl MessageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_raw(raw: u32) -> Self {
        debug_assert_ne!(raw, NIL);
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Exclusive ownership of one message object's payload.
///
/// Handles are not `Clone`. Whoever holds the handle is the only thread allowed to read or
/// write the payload, and handing the handle to a queue transfers that right.
#[derive(Debug, PartialEq, Eq)]
pub struct MessageHandle {
    id: MessageId,
}

impl MessageHandle {
    pub(crate) fn claim(id: MessageId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }
}

/// Who currently owns a message object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageState {
    /// Never handed out.
    Pooled = 0,
    /// Being built by the listener or travelling through a handler queue.
    InTransit = 1,
    /// Held by a bucket of an accumulator.
    Accumulating = 2,
    /// Travelling back to its pool through a return queue.
    Returning = 3,
}

impl MessageState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => MessageState::InTransit,
            2 => MessageState::Accumulating,
            3 => MessageState::Returning,
            _ => MessageState::Pooled,
        }
    }
}

struct Slot {
    message: UnsafeCell<EventMessage>,
    /// Link used by the point-to-point queues.
    queue_next: AtomicU32,
    /// Link used by the repeated-fragment lists of a bucket.
    join_next: AtomicU32,
    releases: AtomicU8,
    state: AtomicU8,
}

impl Slot {
    fn new() -> Self {
        Self {
            message: UnsafeCell::new(EventMessage::empty()),
            queue_next: AtomicU32::new(NIL),
            join_next: AtomicU32::new(NIL),
            releases: AtomicU8::new(0),
            state: AtomicU8::new(MessageState::Pooled as u8),
        }
    }
}

/// Fixed-capacity storage for every message object of a streaming system.
///
/// Objects are preallocated and never freed before the arena is dropped. Each object has a
/// separate link field per role (queue, join list) so the roles can never alias, plus a
/// state tag checked in debug builds and the two-release reclaim counter.
pub struct MessageArena {
    slots: Box<[Slot]>,
    next_fresh: AtomicUsize,
}

// SAFETY: the payload cells are only accessed through a `MessageHandle`, which is unique per
// slot and moves between threads through the queues. The queues publish with release
// ordering and consume with acquire ordering, so every payload access happens after the
// previous owner's writes.
unsafe impl Sync for MessageArena {}

impl MessageArena {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Slot::new()).collect::<Vec<_>>();

        Self {
            slots: slots.into_boxed_slice(),
            next_fresh: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of objects handed out fresh so far.
    pub fn allocated(&self) -> usize {
        self.next_fresh.load(Ordering::Relaxed).min(self.slots.len())
    }

    /// Takes a never-used object and records `origin` as its pool.
    pub fn allocate(&self, origin: u16) -> StreamResult<MessageHandle> {
        let capacity = self.slots.len();
        let claimed = self
            .next_fresh
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                (next < capacity).then_some(next + 1)
            });

        let Ok(index) = claimed else {
            bail!(
                ErrorKind::MessagePoolExhausted,
                "Every message object is in circulation",
                format!("arena capacity is {capacity} messages")
            );
        };

        let mut handle = MessageHandle::claim(MessageId(index as u32));
        self.transition(handle.id, &[MessageState::Pooled], MessageState::InTransit);
        self.message_mut(&mut handle).set_origin(origin);

        Ok(handle)
    }

    pub fn message<'a>(&'a self, handle: &'a MessageHandle) -> &'a EventMessage {
        // SAFETY: holding the handle grants access to the payload, see `MessageHandle`.
        unsafe { &*self.slot(handle.id).message.get() }
    }

    pub fn message_mut<'a>(&'a self, handle: &'a mut MessageHandle) -> &'a mut EventMessage {
        // SAFETY: the handle is unique and borrowed mutably, so no other reference exists.
        unsafe { &mut *self.slot(handle.id).message.get() }
    }

    pub fn state(&self, id: MessageId) -> MessageState {
        MessageState::from_u8(self.slot(id).state.load(Ordering::Relaxed))
    }

    pub(crate) fn queue_link(&self, id: MessageId) -> &AtomicU32 {
        &self.slot(id).queue_next
    }

    /// Moves `id` to state `to`, asserting in debug builds it was in one of `from`.
    pub(crate) fn transition(&self, id: MessageId, from: &[MessageState], to: MessageState) {
        let previous = self.slot(id).state.swap(to as u8, Ordering::Relaxed);
        debug_assert!(
            from.contains(&MessageState::from_u8(previous)),
            "message {id} moved to {to:?} from {:?}, expected one of {from:?}",
            MessageState::from_u8(previous)
        );
    }

    /// Resets the reclaim counter. Sentinels start with one release already recorded.
    pub(crate) fn reset_releases(&self, id: MessageId, already_released: u8) {
        self.slot(id)
            .releases
            .store(already_released, Ordering::Relaxed);
    }

    /// Records one release of `id` and returns `true` when it was the second one.
    ///
    /// Both releases happen on the handler thread owning the message, so the counter needs no
    /// ordering. A third release is a protocol violation.
    pub(crate) fn record_release(&self, id: MessageId) -> StreamResult<bool> {
        let releases = self.slot(id).releases.fetch_add(1, Ordering::Relaxed) + 1;
        if releases > RELEASES_TO_RECLAIM {
            bail!(
                ErrorKind::ReclaimProtocolViolation,
                "Message released more than twice",
                format!("message {id} released {releases} times")
            );
        }

        Ok(releases == RELEASES_TO_RECLAIM)
    }

    /// Appends a message to a bucket's repeated-fragment list, taking ownership of it.
    pub(crate) fn push_join(&self, list: &mut JoinList, handle: MessageHandle) {
        let id = handle.id;
        self.slot(id).join_next.store(NIL, Ordering::Relaxed);

        match list.tail {
            NIL => list.head = id.raw(),
            tail => self
                .slot(MessageId::from_raw(tail))
                .join_next
                .store(id.raw(), Ordering::Relaxed),
        }

        list.tail = id.raw();
        list.len += 1;
    }

    /// Empties `list`, giving back ownership of every message in arrival order.
    pub(crate) fn drain_join(&self, list: &mut JoinList, mut f: impl FnMut(MessageHandle)) {
        let mut cursor = list.head;
        while cursor != NIL {
            let id = MessageId::from_raw(cursor);
            cursor = self.slot(id).join_next.swap(NIL, Ordering::Relaxed);
            f(MessageHandle::claim(id));
        }

        *list = JoinList::default();
    }

    /// Iterates over the messages of `list` without taking them out.
    pub fn iter_join<'a>(&'a self, list: &'a JoinList) -> JoinIter<'a> {
        JoinIter {
            arena: self,
            cursor: list.head,
            remaining: list.len as usize,
        }
    }

    fn slot(&self, id: MessageId) -> &Slot {
        &self.slots[id.index()]
    }
}

impl fmt::Debug for MessageArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageArena")
            .field("capacity", &self.capacity())
            .field("allocated", &self.allocated())
            .finish()
    }
}

/// A list of same-kind fragments owned by one bucket, linked through the join link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinList {
    head: u32,
    tail: u32,
    len: u32,
}

impl JoinList {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for JoinList {
    fn default() -> Self {
        Self {
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }
}

pub struct JoinIter<'a> {
    arena: &'a MessageArena,
    cursor: u32,
    remaining: usize,
}

impl<'a> Iterator for JoinIter<'a> {
    type Item = &'a EventMessage;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }

        let slot = self.arena.slot(MessageId::from_raw(self.cursor));
        self.cursor = slot.join_next.load(Ordering::Relaxed);
        self.remaining = self.remaining.saturating_sub(1);

        // SAFETY: messages on a join list are owned by the bucket the list belongs to, and
        // the list is borrowed for `'a`, so nobody can take them out or write to them.
        Some(unsafe { &*slot.message.get() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for JoinIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    #[test]
    fn allocation_fails_once_capacity_is_used() {
        let arena = MessageArena::with_capacity(2);

        let first = arena.allocate(0).unwrap();
        let second = arena.allocate(1).unwrap();
        let err = arena.allocate(0).unwrap_err();

        assert_ne!(first.id(), second.id());
        assert_eq!(err.kind(), ErrorKind::MessagePoolExhausted);
        assert_eq!(arena.allocated(), 2);
        assert_eq!(arena.message(&second).origin(), 1);
        assert_eq!(arena.state(first.id()), MessageState::InTransit);
    }

    #[test]
    fn second_release_reclaims_and_third_is_a_violation() {
        let arena = MessageArena::with_capacity(1);
        let handle = arena.allocate(0).unwrap();
        arena.reset_releases(handle.id(), 0);

        assert!(!arena.record_release(handle.id()).unwrap());
        assert!(arena.record_release(handle.id()).unwrap());
        assert_eq!(
            arena.record_release(handle.id()).unwrap_err().kind(),
            ErrorKind::ReclaimProtocolViolation
        );
    }

    #[test]
    fn preset_release_reclaims_on_first_call() {
        let arena = MessageArena::with_capacity(1);
        let handle = arena.allocate(0).unwrap();
        arena.reset_releases(handle.id(), 1);

        assert!(arena.record_release(handle.id()).unwrap());
    }

    #[test]
    fn join_list_keeps_arrival_order() {
        let arena = MessageArena::with_capacity(4);
        let mut list = JoinList::default();

        for id in 0..3 {
            let mut handle = arena.allocate(0).unwrap();
            arena
                .message_mut(&mut handle)
                .reinit(MessageKind::ContainerStatus, id);
            arena.push_join(&mut list, handle);
        }

        let seen: Vec<_> = arena.iter_join(&list).map(|m| m.correlation_id()).collect();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(arena.iter_join(&list).len(), 3);

        let mut drained = Vec::new();
        arena.drain_join(&mut list, |handle| drained.push(handle.id().index()));

        assert_eq!(drained, vec![0, 1, 2]);
        assert!(list.is_empty());
        assert_eq!(arena.iter_join(&list).count(), 0);
    }
}
