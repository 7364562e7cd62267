use crate::message::{
    JoinList, MessageArena, MessageHandle, MessageKind, NUMBER_REPEATABLE_KINDS,
    NUMBER_SINGLETON_KINDS,
};

/// Join state for one correlation id.
///
/// The expected fragment count is unknown until the root fragment arrives and declares
/// its fan-out. Buckets are recycled, never freed.
#[derive(Debug, Default)]
pub struct Bucket {
    pub(super) key: Option<i32>,
    pub(super) fan_out: Option<u32>,
    pub(super) received: u32,
    pub(super) singletons: [Option<MessageHandle>; NUMBER_SINGLETON_KINDS],
    pub(super) repeated: [JoinList; NUMBER_REPEATABLE_KINDS],
    /// Next bucket mapping to the same table slot, as an index into the overflow store.
    pub(super) chain: Option<u32>,
}

impl Bucket {
    pub fn key(&self) -> Option<i32> {
        self.key
    }

    /// Fan-out declared by the root fragment, once it has arrived.
    pub fn fan_out(&self) -> Option<u32> {
        self.fan_out
    }

    /// Expected number of fragments, or 0 while the root fragment is missing.
    pub fn expected_count(&self) -> u32 {
        self.fan_out
            .and_then(MessageKind::expected_fragments)
            .unwrap_or(0)
    }

    pub fn received_count(&self) -> u32 {
        self.received
    }

    pub fn is_complete(&self) -> bool {
        let expected = self.expected_count();
        expected != 0 && self.received == expected
    }

    /// The fragment of singleton kind `kind`, if it has arrived.
    pub fn singleton(&self, kind: MessageKind) -> Option<&MessageHandle> {
        self.singletons[kind.singleton_index()?].as_ref()
    }

    /// The fragments of repeatable kind `kind` received so far.
    pub fn repeated(&self, kind: MessageKind) -> Option<&JoinList> {
        Some(&self.repeated[kind.repeatable_index()?])
    }

    /// Number of fragments of `kind` held by this bucket.
    pub fn fragments_of(&self, kind: MessageKind) -> usize {
        match (kind.singleton_index(), kind.repeatable_index()) {
            (Some(index), _) => usize::from(self.singletons[index].is_some()),
            (_, Some(index)) => self.repeated[index].len(),
            _ => 0,
        }
    }

    /// Hands every held message to `release`, singletons first, leaving the bucket empty.
    pub fn release_messages<F, E>(&mut self, arena: &MessageArena, mut release: F) -> Result<(), E>
    where
        F: FnMut(MessageHandle) -> Result<(), E>,
    {
        let mut result = Ok(());

        for slot in &mut self.singletons {
            if let Some(handle) = slot.take() {
                if result.is_ok() {
                    result = release(handle);
                }
            }
        }

        for list in &mut self.repeated {
            arena.drain_join(list, |handle| {
                if result.is_ok() {
                    result = release(handle);
                }
            });
        }

        self.received = 0;
        result
    }
}
