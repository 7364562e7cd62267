use std::fmt;

use rmevents_config::shared::WatchedTable;
use serde::Serialize;

/// Number of message kinds, one per watched table.
pub const NUMBER_MSG_KINDS: usize = 5;

/// Kinds arriving exactly once per correlation id.
pub const NUMBER_SINGLETON_KINDS: usize = 3;

/// Kinds arriving once per unit of fan-out.
pub const NUMBER_REPEATABLE_KINDS: usize = 2;

/// The source table a fragment was read from.
///
/// Three kinds arrive exactly once per correlation id. The two repeatable kinds arrive as many
/// times as the root fragment's fan-out says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MessageKind {
    /// Root fragment. Carries the fan-out of the two repeatable kinds.
    PendingEvent = 0,
    RmNode = 1,
    Resource = 2,
    UpdatedContainerInfo = 3,
    ContainerStatus = 4,
}

impl MessageKind {
    pub const ALL: [MessageKind; NUMBER_MSG_KINDS] = [
        MessageKind::PendingEvent,
        MessageKind::RmNode,
        MessageKind::Resource,
        MessageKind::UpdatedContainerInfo,
        MessageKind::ContainerStatus,
    ];

    /// Kinds contributing exactly one fragment to a completed event.
    pub const SINGLETONS: [MessageKind; NUMBER_SINGLETON_KINDS] = [
        MessageKind::PendingEvent,
        MessageKind::RmNode,
        MessageKind::Resource,
    ];

    /// Kinds contributing `fan_out` fragments to a completed event.
    pub const REPEATABLE: [MessageKind; NUMBER_REPEATABLE_KINDS] = [
        MessageKind::UpdatedContainerInfo,
        MessageKind::ContainerStatus,
    ];

    /// The kind whose fragment declares the fan-out.
    pub const ROOT: MessageKind = MessageKind::PendingEvent;

    /// Message field of the root fragment holding the fan-out.
    pub const ROOT_FAN_OUT_FIELD: usize = 3;

    pub fn is_singleton(&self) -> bool {
        self.singleton_index().is_some()
    }

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    /// Position of this kind in [`MessageKind::SINGLETONS`].
    pub fn singleton_index(&self) -> Option<usize> {
        match self {
            MessageKind::PendingEvent => Some(0),
            MessageKind::RmNode => Some(1),
            MessageKind::Resource => Some(2),
            _ => None,
        }
    }

    /// Position of this kind in [`MessageKind::REPEATABLE`].
    pub fn repeatable_index(&self) -> Option<usize> {
        match self {
            MessageKind::UpdatedContainerInfo => Some(0),
            MessageKind::ContainerStatus => Some(1),
            _ => None,
        }
    }

    /// Number of fragments a bucket expects once the root declared `fan_out`.
    ///
    /// Returns [`None`] when the count does not fit in a `u32`.
    pub fn expected_fragments(fan_out: u32) -> Option<u32> {
        (NUMBER_REPEATABLE_KINDS as u32)
            .checked_mul(fan_out)?
            .checked_add(NUMBER_SINGLETON_KINDS as u32)
    }

    pub fn table(&self) -> WatchedTable {
        match self {
            MessageKind::PendingEvent => WatchedTable::PendingEvents,
            MessageKind::RmNode => WatchedTable::RmNode,
            MessageKind::Resource => WatchedTable::Resource,
            MessageKind::UpdatedContainerInfo => WatchedTable::UpdatedContainerInfo,
            MessageKind::ContainerStatus => WatchedTable::ContainerStatus,
        }
    }
}

impl From<WatchedTable> for MessageKind {
    fn from(table: WatchedTable) -> Self {
        match table {
            WatchedTable::PendingEvents => MessageKind::PendingEvent,
            WatchedTable::RmNode => MessageKind::RmNode,
            WatchedTable::Resource => MessageKind::Resource,
            WatchedTable::UpdatedContainerInfo => MessageKind::UpdatedContainerInfo,
            WatchedTable::ContainerStatus => MessageKind::ContainerStatus,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::PendingEvent => "pending_event",
            MessageKind::RmNode => "rm_node",
            MessageKind::Resource => "resource",
            MessageKind::UpdatedContainerInfo => "updated_container_info",
            MessageKind::ContainerStatus => "container_status",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_fragments_counts_singletons_and_fan_out() {
        assert_eq!(MessageKind::expected_fragments(0), Some(3));
        assert_eq!(MessageKind::expected_fragments(2), Some(7));
    }

    #[test]
    fn expected_fragments_rejects_counts_past_u32() {
        assert_eq!(MessageKind::expected_fragments(u32::MAX / 2 - 1), Some(u32::MAX));
        assert_eq!(MessageKind::expected_fragments(u32::MAX / 2), None);
        assert_eq!(MessageKind::expected_fragments(i32::MAX as u32), None);
    }

    #[test]
    fn kinds_map_to_tables_and_back() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from(kind.table()), kind);
        }
    }

    #[test]
    fn singleton_and_repeatable_kinds_are_disjoint() {
        for kind in MessageKind::ALL {
            assert_ne!(kind.singleton_index().is_some(), kind.repeatable_index().is_some());
        }
        assert!(MessageKind::ROOT.is_singleton());
    }
}
