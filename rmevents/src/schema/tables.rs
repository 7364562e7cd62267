use crate::bail;
use crate::error::{ErrorKind, StreamResult};
use crate::message::{EventMessage, MessageKind};
use crate::source::{ColumnValue, RowChange};

/// Storage type of a watched column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int32,
    Int64,
    /// Variable-length string, stored as received.
    Varchar,
    /// Fixed-length string. Trailing blank padding is stripped.
    Char,
}

/// What a column contributes to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// The column holding the correlation id.
    Correlation,
    /// The column stored in message field `index`.
    Field(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchColumn {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub role: ColumnRole,
}

/// Descriptor of one watched table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTable {
    pub name: &'static str,
    pub kind: MessageKind,
    /// Columns in row order.
    pub columns: &'static [WatchColumn],
    /// Message field carrying the declared fan-out. Only set for the root kind.
    pub fan_out_field: Option<usize>,
}

const fn correlation(name: &'static str) -> WatchColumn {
    WatchColumn {
        name,
        column_type: ColumnType::Int32,
        role: ColumnRole::Correlation,
    }
}

const fn field(name: &'static str, column_type: ColumnType, index: usize) -> WatchColumn {
    WatchColumn {
        name,
        column_type,
        role: ColumnRole::Field(index),
    }
}

static PENDING_EVENTS: WatchTable = WatchTable {
    name: "yarn_pendingevents",
    kind: MessageKind::PendingEvent,
    columns: &[
        correlation("id"),
        field("rmnodeid", ColumnType::Char, 0),
        field("type", ColumnType::Char, 1),
        field("status", ColumnType::Char, 2),
        field("contains", ColumnType::Int32, 3),
    ],
    fan_out_field: Some(MessageKind::ROOT_FAN_OUT_FIELD),
};

static RM_NODE: WatchTable = WatchTable {
    name: "yarn_rmnode",
    kind: MessageKind::RmNode,
    columns: &[
        field("rmnodeid", ColumnType::Char, 0),
        field("hostname", ColumnType::Varchar, 1),
        field("commandport", ColumnType::Int32, 2),
        field("httpport", ColumnType::Int32, 3),
        field("healthreport", ColumnType::Varchar, 4),
        field("lasthealthreporttime", ColumnType::Int64, 5),
        field("currentstate", ColumnType::Char, 6),
        field("nodemanagerversion", ColumnType::Varchar, 7),
        correlation("pendingeventid"),
    ],
    fan_out_field: None,
};

static RESOURCE: WatchTable = WatchTable {
    name: "yarn_resource",
    kind: MessageKind::Resource,
    columns: &[
        field("id", ColumnType::Char, 0),
        field("memory", ColumnType::Int32, 1),
        field("virtualcores", ColumnType::Int32, 2),
        correlation("pendingeventid"),
    ],
    fan_out_field: None,
};

static UPDATED_CONTAINER_INFO: WatchTable = WatchTable {
    name: "yarn_updatedcontainerinfo",
    kind: MessageKind::UpdatedContainerInfo,
    columns: &[
        field("rmnodeid", ColumnType::Char, 0),
        field("containerid", ColumnType::Char, 1),
        field("updatedcontainerinfoid", ColumnType::Int32, 2),
        correlation("pendingeventid"),
    ],
    fan_out_field: None,
};

static CONTAINER_STATUS: WatchTable = WatchTable {
    name: "yarn_containerstatus",
    kind: MessageKind::ContainerStatus,
    columns: &[
        field("containerid", ColumnType::Char, 0),
        field("rmnodeid", ColumnType::Char, 1),
        field("type", ColumnType::Char, 2),
        field("state", ColumnType::Char, 3),
        field("diagnostics", ColumnType::Varchar, 4),
        field("exitstatus", ColumnType::Int32, 5),
        field("uciid", ColumnType::Int32, 6),
        correlation("pendingeventid"),
    ],
    fan_out_field: None,
};

impl WatchTable {
    pub fn for_kind(kind: MessageKind) -> &'static WatchTable {
        match kind {
            MessageKind::PendingEvent => &PENDING_EVENTS,
            MessageKind::RmNode => &RM_NODE,
            MessageKind::Resource => &RESOURCE,
            MessageKind::UpdatedContainerInfo => &UPDATED_CONTAINER_INFO,
            MessageKind::ContainerStatus => &CONTAINER_STATUS,
        }
    }

    /// Row index of the correlation column.
    pub fn correlation_column(&self) -> usize {
        self.columns
            .iter()
            .position(|column| column.role == ColumnRole::Correlation)
            .unwrap_or(0)
    }

    /// Number of message fields populated from this table.
    pub fn field_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|column| matches!(column.role, ColumnRole::Field(_)))
            .count()
    }

    /// Column name stored in message field `index`.
    pub fn field_name(&self, index: usize) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|column| column.role == ColumnRole::Field(index))
            .map(|column| column.name)
    }

    /// Type of the column stored in message field `index`.
    pub fn field_type(&self, index: usize) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|column| column.role == ColumnRole::Field(index))
            .map(|column| column.column_type)
    }

    /// Fills `message` from `row` and returns the row's correlation id.
    ///
    /// On error the message content is unspecified and the caller drops it.
    pub fn populate(&self, row: &RowChange<'_>, message: &mut EventMessage) -> StreamResult<i32> {
        let correlation_id = self.read_correlation_id(row)?;
        message.reinit(self.kind, correlation_id);

        for (index, column) in self.columns.iter().enumerate() {
            let ColumnRole::Field(field_index) = column.role else {
                continue;
            };

            let Some(value) = row.column(index) else {
                bail!(
                    ErrorKind::MissingColumn,
                    "Row change is missing a watched column",
                    format!("{}.{} (column {index})", self.name, column.name)
                );
            };

            match (column.column_type, value) {
                (_, ColumnValue::Null) => {}
                (ColumnType::Int32, ColumnValue::Int32(value)) => {
                    message.set_i32(field_index, value)?
                }
                (ColumnType::Int64, ColumnValue::Int64(value)) => {
                    message.set_i64(field_index, value)?
                }
                (ColumnType::Int64, ColumnValue::Int32(value)) => {
                    message.set_i64(field_index, i64::from(value))?
                }
                (ColumnType::Varchar, ColumnValue::Bytes(bytes)) => {
                    message.set_str(field_index, bytes)?
                }
                (ColumnType::Char, ColumnValue::Bytes(bytes)) => {
                    message.set_str(field_index, trim_padding(bytes))?
                }
                (column_type, value) => bail!(
                    ErrorKind::ColumnTypeMismatch,
                    "Row change column has an unexpected type",
                    format!(
                        "{}.{} expects {column_type:?}, got {value:?}",
                        self.name, column.name
                    )
                ),
            }
        }

        if let Some(fan_out_field) = self.fan_out_field {
            if message.get_i32(fan_out_field).is_none() {
                bail!(
                    ErrorKind::MissingColumn,
                    "Root row change does not declare a fan-out",
                    format!("{} correlation id {correlation_id}", self.name)
                );
            }
        }

        Ok(correlation_id)
    }

    fn read_correlation_id(&self, row: &RowChange<'_>) -> StreamResult<i32> {
        let index = self.correlation_column();
        let correlation_id = match row.column(index) {
            Some(ColumnValue::Int32(value)) => value,
            Some(ColumnValue::Int64(value)) => match i32::try_from(value) {
                Ok(value) => value,
                Err(_) => bail!(
                    ErrorKind::InvalidCorrelationId,
                    "Correlation id does not fit 32 bits",
                    format!("{} correlation id {value}", self.name)
                ),
            },
            None | Some(ColumnValue::Null) => bail!(
                ErrorKind::MissingColumn,
                "Row change has no correlation id",
                format!("{} (column {index})", self.name)
            ),
            Some(value) => bail!(
                ErrorKind::ColumnTypeMismatch,
                "Correlation id is not an integer",
                format!("{} correlation column holds {value:?}", self.name)
            ),
        };

        if correlation_id < 0 {
            bail!(
                ErrorKind::InvalidCorrelationId,
                "Correlation id is negative",
                format!("{} correlation id {correlation_id}", self.name)
            );
        }

        Ok(correlation_id)
    }
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|byte| *byte != b' ')
        .map_or(0, |last| last + 1);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FieldValue, MAX_FIELDS, MessageArena, STRING_ARENA_BYTES};

    fn with_message<T>(f: impl FnOnce(&mut EventMessage) -> T) -> T {
        let arena = MessageArena::with_capacity(1);
        let mut handle = arena.allocate(0).unwrap();
        f(arena.message_mut(&mut handle))
    }

    #[test]
    fn every_table_fits_a_message() {
        for kind in MessageKind::ALL {
            let table = WatchTable::for_kind(kind);
            assert_eq!(table.kind, kind);
            assert!(table.field_count() <= MAX_FIELDS);
            assert_eq!(table.field_count() + 1, table.columns.len());
            assert_eq!(table.fan_out_field.is_some(), kind.is_root());
            for index in 0..table.field_count() {
                assert!(table.field_name(index).is_some(), "{} field {index}", table.name);
            }
        }
    }

    #[test]
    fn populates_pending_event_and_trims_padding() {
        let row = [
            ColumnValue::Int32(42),
            ColumnValue::Bytes(b"node-1   "),
            ColumnValue::Bytes(b"NODE_UPDATE"),
            ColumnValue::Null,
            ColumnValue::Int32(2),
        ];

        with_message(|message| {
            let table = WatchTable::for_kind(MessageKind::PendingEvent);
            let correlation_id = table.populate(&RowChange::new(&row), message).unwrap();

            assert_eq!(correlation_id, 42);
            assert_eq!(message.kind(), MessageKind::PendingEvent);
            assert_eq!(message.correlation_id(), 42);
            assert_eq!(message.get_str(0), Some(&b"node-1"[..]));
            assert_eq!(message.get_str(1), Some(&b"NODE_UPDATE"[..]));
            assert_eq!(message.field(2), Some(FieldValue::Unset));
            assert_eq!(message.get_i32(MessageKind::ROOT_FAN_OUT_FIELD), Some(2));
        });
    }

    #[test]
    fn correlation_column_may_come_last() {
        let row = [
            ColumnValue::Bytes(b"r-1"),
            ColumnValue::Int32(1024),
            ColumnValue::Int32(4),
            ColumnValue::Int64(7),
        ];

        with_message(|message| {
            let table = WatchTable::for_kind(MessageKind::Resource);
            assert_eq!(table.correlation_column(), 3);
            assert_eq!(table.populate(&RowChange::new(&row), message).unwrap(), 7);
            assert_eq!(message.get_i32(1), Some(1024));
        });
    }

    #[test]
    fn varchar_keeps_trailing_blanks_and_int64_widens() {
        let mut row = vec![ColumnValue::Null; 9];
        row[1] = ColumnValue::Bytes(b"host ");
        row[5] = ColumnValue::Int32(99);
        row[8] = ColumnValue::Int32(3);

        with_message(|message| {
            WatchTable::for_kind(MessageKind::RmNode)
                .populate(&RowChange::new(&row), message)
                .unwrap();
            assert_eq!(message.get_str(1), Some(&b"host "[..]));
            assert_eq!(message.get_i64(5), Some(99));
        });
    }

    #[test]
    fn rejects_malformed_rows() {
        let table = WatchTable::for_kind(MessageKind::Resource);
        let cases: [(&[ColumnValue<'_>], ErrorKind); 5] = [
            (
                &[ColumnValue::Bytes(b"r"), ColumnValue::Int32(1)],
                ErrorKind::MissingColumn,
            ),
            (
                &[
                    ColumnValue::Bytes(b"r"),
                    ColumnValue::Int32(1),
                    ColumnValue::Int32(1),
                    ColumnValue::Int32(-4),
                ],
                ErrorKind::InvalidCorrelationId,
            ),
            (
                &[
                    ColumnValue::Bytes(b"r"),
                    ColumnValue::Int32(1),
                    ColumnValue::Int32(1),
                    ColumnValue::Int64(i64::MAX),
                ],
                ErrorKind::InvalidCorrelationId,
            ),
            (
                &[
                    ColumnValue::Int32(5),
                    ColumnValue::Int32(1),
                    ColumnValue::Int32(1),
                    ColumnValue::Int32(4),
                ],
                ErrorKind::ColumnTypeMismatch,
            ),
            (
                &[
                    ColumnValue::Bytes(b"r"),
                    ColumnValue::Int32(1),
                    ColumnValue::Int32(1),
                    ColumnValue::Null,
                ],
                ErrorKind::MissingColumn,
            ),
        ];

        for (row, expected) in cases {
            let err = with_message(|message| table.populate(&RowChange::new(row), message))
                .unwrap_err();
            assert_eq!(err.kind(), expected, "{err}");
            assert!(err.kind().drops_fragment());
        }
    }

    #[test]
    fn root_without_fan_out_is_rejected() {
        let row = [
            ColumnValue::Int32(1),
            ColumnValue::Null,
            ColumnValue::Null,
            ColumnValue::Null,
            ColumnValue::Null,
        ];

        let err = with_message(|message| {
            WatchTable::for_kind(MessageKind::PendingEvent).populate(&RowChange::new(&row), message)
        })
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingColumn);
    }

    #[test]
    fn oversized_strings_fill_the_arena() {
        let long = vec![b'x'; STRING_ARENA_BYTES];
        let row = [
            ColumnValue::Bytes(b"c-1"),
            ColumnValue::Bytes(b"n-1"),
            ColumnValue::Bytes(b"t"),
            ColumnValue::Bytes(b"RUNNING"),
            ColumnValue::Bytes(&long),
            ColumnValue::Int32(0),
            ColumnValue::Int32(1),
            ColumnValue::Int32(8),
        ];

        let err = with_message(|message| {
            WatchTable::for_kind(MessageKind::ContainerStatus)
                .populate(&RowChange::new(&row), message)
        })
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StringArenaFull);
    }

    #[test]
    fn trims_only_trailing_blanks() {
        assert_eq!(trim_padding(b"  a b  "), b"  a b");
        assert_eq!(trim_padding(b"    "), b"");
        assert_eq!(trim_padding(b""), b"");
    }
}
