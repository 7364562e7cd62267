use serde::Serialize;

use crate::accumulator::Bucket;
use crate::bail;
use crate::error::{ErrorKind, StreamResult};
use crate::message::{
    EventMessage, FieldValue, JoinIter, MessageArena, MessageKind, NUMBER_SINGLETON_KINDS,
};
use crate::schema::WatchTable;

/// A completed event, borrowing the joined messages in place.
#[derive(Debug, Clone, Copy)]
pub struct JoinedEvent<'a> {
    arena: &'a MessageArena,
    bucket: &'a Bucket,
    singletons: [&'a EventMessage; NUMBER_SINGLETON_KINDS],
}

impl<'a> JoinedEvent<'a> {
    pub(crate) fn new(arena: &'a MessageArena, bucket: &'a Bucket) -> StreamResult<Self> {
        let mut singletons = [None; NUMBER_SINGLETON_KINDS];
        for (slot, kind) in singletons.iter_mut().zip(MessageKind::SINGLETONS) {
            *slot = bucket.singleton(kind).map(|handle| arena.message(handle));
        }

        let [Some(pending_event), Some(rm_node), Some(resource)] = singletons else {
            bail!(
                ErrorKind::InvalidState,
                "Completed bucket is missing a singleton fragment",
                format!("correlation id {:?}", bucket.key())
            );
        };

        Ok(Self {
            arena,
            bucket,
            singletons: [pending_event, rm_node, resource],
        })
    }

    pub fn correlation_id(&self) -> i32 {
        self.singletons[0].correlation_id()
    }

    /// Number of repeatable fragments of each kind declared by the root.
    pub fn fan_out(&self) -> u32 {
        self.bucket.fan_out().unwrap_or(0)
    }

    pub fn pending_event(&self) -> &'a EventMessage {
        self.singletons[0]
    }

    pub fn rm_node(&self) -> &'a EventMessage {
        self.singletons[1]
    }

    pub fn resource(&self) -> &'a EventMessage {
        self.singletons[2]
    }

    pub fn updated_container_infos(&self) -> JoinIter<'a> {
        self.repeated(MessageKind::UpdatedContainerInfo)
    }

    pub fn container_statuses(&self) -> JoinIter<'a> {
        self.repeated(MessageKind::ContainerStatus)
    }

    /// Total number of fields carried by the joined messages.
    pub fn joined_value_count(&self) -> usize {
        let singletons = self
            .singletons
            .iter()
            .map(|message| WatchTable::for_kind(message.kind()).field_count())
            .sum::<usize>();
        let repeated = MessageKind::REPEATABLE
            .iter()
            .map(|kind| WatchTable::for_kind(*kind).field_count() * self.repeated(*kind).len())
            .sum::<usize>();

        singletons + repeated
    }

    /// Copies the event out of the message objects.
    pub fn to_completed(&self) -> CompletedEvent {
        CompletedEvent {
            correlation_id: self.correlation_id(),
            pending_event: FragmentRecord::from_message(self.pending_event()),
            rm_node: FragmentRecord::from_message(self.rm_node()),
            resource: FragmentRecord::from_message(self.resource()),
            updated_container_infos: self
                .updated_container_infos()
                .map(FragmentRecord::from_message)
                .collect(),
            container_statuses: self
                .container_statuses()
                .map(FragmentRecord::from_message)
                .collect(),
        }
    }

    fn repeated(&self, kind: MessageKind) -> JoinIter<'a> {
        let bucket: &'a Bucket = self.bucket;
        let list = bucket
            .repeated(kind)
            .unwrap_or_else(|| unreachable!("{kind} is a repeatable kind"));
        self.arena.iter_join(list)
    }
}

/// Owned copy of a completed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedEvent {
    pub correlation_id: i32,
    pub pending_event: FragmentRecord,
    pub rm_node: FragmentRecord,
    pub resource: FragmentRecord,
    pub updated_container_infos: Vec<FragmentRecord>,
    pub container_statuses: Vec<FragmentRecord>,
}

/// Owned copy of one fragment, with fields named after their columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FragmentRecord {
    pub kind: MessageKind,
    pub fields: Vec<(&'static str, FieldData)>,
}

impl FragmentRecord {
    fn from_message(message: &EventMessage) -> Self {
        let table = WatchTable::for_kind(message.kind());
        let fields = (0..table.field_count())
            .filter_map(|index| {
                let name = table.field_name(index)?;
                let value = match message.field(index)? {
                    FieldValue::Unset => FieldData::Null,
                    FieldValue::Int32(value) => FieldData::Int32(value),
                    FieldValue::Int64(value) => FieldData::Int64(value),
                    FieldValue::Str(bytes) => {
                        FieldData::Text(String::from_utf8_lossy(bytes).into_owned())
                    }
                };
                Some((name, value))
            })
            .collect();

        Self {
            kind: message.kind(),
            fields,
        }
    }

    /// Value of the field named `name`.
    pub fn get(&self, name: &str) -> Option<&FieldData> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldData {
    Null,
    Int32(i32),
    Int64(i64),
    Text(String),
}
