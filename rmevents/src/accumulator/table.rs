use std::mem;

use crate::accumulator::bucket::Bucket;
use crate::bail;
use crate::error::{ErrorKind, StreamResult};
use crate::message::{MessageArena, MessageHandle, MessageKind, MessageState};

/// Location of a bucket inside a [`MessageAccumulator`].
///
/// Only valid until the next [`MessageAccumulator::lookup`] or
/// [`MessageAccumulator::remove`], which may move buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketRef {
    /// The direct table slot.
    Table(u32),
    /// A chained bucket hanging off table slot `slot`.
    Chained { slot: u32, node: u32 },
}

/// Hash-indexed join table owned by one handler.
///
/// Ids are sharded over handlers with a modulo, so each handler sees every `key_reduce`-th
/// id. Dividing by `key_reduce` before masking turns that sparse sequence back into
/// consecutive slots. Colliding ids are chained through an overflow store that is never
/// shrunk. The direct table never grows.
#[derive(Debug)]
pub struct MessageAccumulator {
    slots: Box<[Bucket]>,
    mask: u32,
    key_reduce: i32,
    overflow: Vec<Bucket>,
    free_overflow: Vec<u32>,
    pending: usize,
}

impl MessageAccumulator {
    /// Creates a table with `2^size_bits` direct slots for a handler that sees every
    /// `key_reduce`-th correlation id.
    pub fn new(size_bits: u32, key_reduce: usize) -> Self {
        debug_assert!(size_bits > 0 && size_bits < 32);
        let size = 1usize << size_bits;
        let slots = (0..size).map(|_| Bucket::default()).collect::<Vec<_>>();

        Self {
            slots: slots.into_boxed_slice(),
            mask: (size - 1) as u32,
            key_reduce: key_reduce.clamp(1, i32::MAX as usize) as i32,
            overflow: Vec::new(),
            free_overflow: Vec::new(),
            pending: 0,
        }
    }

    /// Number of buckets waiting for fragments.
    pub fn len(&self) -> usize {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Returns the bucket for `key`, creating an empty one if needed.
    pub fn lookup(&mut self, key: i32) -> BucketRef {
        let slot = self.slot_of(key);

        let direct = &mut self.slots[slot as usize];
        match direct.key {
            None => {
                direct.key = Some(key);
                self.pending += 1;
                return BucketRef::Table(slot);
            }
            Some(existing) if existing == key => return BucketRef::Table(slot),
            Some(_) => {}
        }

        let mut last = None;
        let mut cursor = direct.chain;
        while let Some(node) = cursor {
            let chained = &self.overflow[node as usize];
            if chained.key == Some(key) {
                return BucketRef::Chained { slot, node };
            }
            last = Some(node);
            cursor = chained.chain;
        }

        let node = self.allocate_chained(key);
        match last {
            None => self.slots[slot as usize].chain = Some(node),
            Some(last) => self.overflow[last as usize].chain = Some(node),
        }
        self.pending += 1;

        BucketRef::Chained { slot, node }
    }

    pub fn bucket(&self, bucket: BucketRef) -> &Bucket {
        match bucket {
            BucketRef::Table(slot) => &self.slots[slot as usize],
            BucketRef::Chained { node, .. } => &self.overflow[node as usize],
        }
    }

    fn bucket_mut(&mut self, bucket: BucketRef) -> &mut Bucket {
        match bucket {
            BucketRef::Table(slot) => &mut self.slots[slot as usize],
            BucketRef::Chained { node, .. } => &mut self.overflow[node as usize],
        }
    }

    pub fn is_complete(&self, bucket: BucketRef) -> bool {
        self.bucket(bucket).is_complete()
    }

    /// Adds a fragment to `bucket` and returns whether the bucket is now complete.
    ///
    /// A singleton kind arriving twice, or more repeatable fragments than the root's
    /// fan-out allows, is a protocol violation.
    pub fn accept_fragment(
        &mut self,
        bucket: BucketRef,
        handle: MessageHandle,
        arena: &MessageArena,
    ) -> StreamResult<bool> {
        let message = arena.message(&handle);
        let kind = message.kind();
        let correlation_id = message.correlation_id();
        let declared_fan_out = kind
            .is_root()
            .then(|| message.get_i32(MessageKind::ROOT_FAN_OUT_FIELD));

        let target = self.bucket_mut(bucket);
        debug_assert_eq!(target.key, Some(correlation_id));

        if target.is_complete() {
            bail!(
                ErrorKind::FanOutMismatch,
                "Fragment arrived for a completed event",
                format!("{kind} fragment for correlation id {correlation_id}")
            );
        }

        if let Some(fan_out) = declared_fan_out {
            let fan_out = match fan_out.map(u32::try_from) {
                Some(Ok(fan_out)) if MessageKind::expected_fragments(fan_out).is_some() => {
                    fan_out
                }
                _ => bail!(
                    ErrorKind::FanOutMismatch,
                    "Root fragment declares an invalid fan-out",
                    format!("correlation id {correlation_id} declared {fan_out:?}")
                ),
            };
            if target.fan_out.is_some() {
                bail!(
                    ErrorKind::DuplicateFragment,
                    "Fragment kind arrived twice for one event",
                    format!("{kind} fragment for correlation id {correlation_id}")
                );
            }
            target.fan_out = Some(fan_out);
        }

        match (kind.singleton_index(), kind.repeatable_index()) {
            (Some(index), _) => {
                if target.singletons[index].is_some() {
                    bail!(
                        ErrorKind::DuplicateFragment,
                        "Fragment kind arrived twice for one event",
                        format!("{kind} fragment for correlation id {correlation_id}")
                    );
                }
                arena.transition(
                    handle.id(),
                    &[MessageState::InTransit],
                    MessageState::Accumulating,
                );
                target.singletons[index] = Some(handle);
            }
            (_, Some(index)) => {
                arena.transition(
                    handle.id(),
                    &[MessageState::InTransit],
                    MessageState::Accumulating,
                );
                arena.push_join(&mut target.repeated[index], handle);
            }
            (None, None) => unreachable!("every kind is singleton or repeatable"),
        }
        target.received += 1;

        if let Some(fan_out) = target.fan_out {
            for (kind, list) in MessageKind::REPEATABLE.iter().zip(&target.repeated) {
                if list.len() > fan_out as usize {
                    bail!(
                        ErrorKind::FanOutMismatch,
                        "More repeated fragments than the declared fan-out",
                        format!(
                            "correlation id {correlation_id} declared fan-out {fan_out} but has {} {kind} fragments",
                            list.len()
                        )
                    );
                }
            }
        }

        Ok(target.is_complete())
    }

    /// Takes a completed bucket out of the table and returns it with its messages.
    ///
    /// Removing the direct slot promotes the first chained bucket into it. Removing a
    /// chained bucket unlinks it. Vacated overflow nodes are kept for reuse.
    pub fn remove(&mut self, bucket: BucketRef) -> StreamResult<Bucket> {
        let target = self.bucket(bucket);
        if !target.is_complete() {
            bail!(
                ErrorKind::IncompleteBucketRemoval,
                "Attempted to remove an incomplete bucket",
                format!(
                    "correlation id {:?} has {} of {} fragments",
                    target.key,
                    target.received_count(),
                    target.expected_count()
                )
            );
        }

        let mut removed = match bucket {
            BucketRef::Table(slot) => {
                let mut removed = mem::take(&mut self.slots[slot as usize]);
                if let Some(node) = removed.chain.take() {
                    self.slots[slot as usize] = mem::take(&mut self.overflow[node as usize]);
                    self.free_overflow.push(node);
                }
                removed
            }
            BucketRef::Chained { slot, node } => {
                let mut removed = mem::take(&mut self.overflow[node as usize]);
                let successor = removed.chain.take();

                if self.slots[slot as usize].chain == Some(node) {
                    self.slots[slot as usize].chain = successor;
                } else {
                    let mut cursor = self.slots[slot as usize].chain;
                    while let Some(current) = cursor {
                        let chained = &mut self.overflow[current as usize];
                        if chained.chain == Some(node) {
                            chained.chain = successor;
                            break;
                        }
                        cursor = chained.chain;
                    }
                }

                self.free_overflow.push(node);
                removed
            }
        };

        removed.chain = None;
        self.pending -= 1;

        Ok(removed)
    }

    fn slot_of(&self, key: i32) -> u32 {
        (key.div_euclid(self.key_reduce) as u32) & self.mask
    }

    fn allocate_chained(&mut self, key: i32) -> u32 {
        let node = match self.free_overflow.pop() {
            Some(node) => node,
            None => {
                self.overflow.push(Bucket::default());
                (self.overflow.len() - 1) as u32
            }
        };

        self.overflow[node as usize].key = Some(key);
        node
    }
}
