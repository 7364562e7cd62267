use crate::bail;
use crate::error::{ErrorKind, StreamResult};
use crate::message::kind::MessageKind;

/// Maximum number of typed fields a message carries.
pub const MAX_FIELDS: usize = 8;

/// Bytes available in each message for string field payloads.
pub const STRING_ARENA_BYTES: usize = 368;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FieldSlot {
    #[default]
    Unset,
    Int32(i32),
    Int64(i64),
    Str {
        offset: u16,
        len: u16,
    },
}

/// A read-only view of one message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Unset,
    Int32(i32),
    Int64(i64),
    Str(&'a [u8]),
}

/// One change-event fragment.
///
/// The object is self-contained: string payloads are copied into its own bump-allocated
/// byte buffer, which is reclaimed as a whole by [`EventMessage::reinit`]. Objects are cache
/// line aligned so the listener and a handler never write to the same line.
#[derive(Debug)]
#[repr(C, align(64))]
pub struct EventMessage {
    kind: MessageKind,
    origin: u16,
    correlation_id: i32,
    strings_used: u16,
    fields: [FieldSlot; MAX_FIELDS],
    strings: [u8; STRING_ARENA_BYTES],
}

impl EventMessage {
    pub(crate) fn empty() -> Self {
        Self {
            kind: MessageKind::PendingEvent,
            origin: 0,
            correlation_id: 0,
            strings_used: 0,
            fields: [FieldSlot::Unset; MAX_FIELDS],
            strings: [0; STRING_ARENA_BYTES],
        }
    }

    /// Reconstructs the message in place for a new fragment.
    ///
    /// All fields become unset and the string buffer is emptied. The origin pool is kept.
    pub fn reinit(&mut self, kind: MessageKind, correlation_id: i32) {
        self.kind = kind;
        self.correlation_id = correlation_id;
        self.strings_used = 0;
        self.fields = [FieldSlot::Unset; MAX_FIELDS];
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn correlation_id(&self) -> i32 {
        self.correlation_id
    }

    /// Index of the pool this object was first allocated by.
    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: u16) {
        self.origin = origin;
    }

    pub fn set_i32(&mut self, index: usize, value: i32) -> StreamResult<()> {
        *self.slot_mut(index)? = FieldSlot::Int32(value);
        Ok(())
    }

    pub fn set_i64(&mut self, index: usize, value: i64) -> StreamResult<()> {
        *self.slot_mut(index)? = FieldSlot::Int64(value);
        Ok(())
    }

    /// Copies `value` into the string buffer and points field `index` at it.
    ///
    /// Fails with [`ErrorKind::StringArenaFull`] without modifying the message when the
    /// remaining buffer is too small.
    pub fn set_str(&mut self, index: usize, value: &[u8]) -> StreamResult<()> {
        if index >= MAX_FIELDS {
            bail!(
                ErrorKind::FieldIndexOutOfRange,
                "Message field index out of range",
                format!("field {index} of {} in a {} message", MAX_FIELDS, self.kind)
            );
        }

        let offset = self.strings_used as usize;
        if value.len() > STRING_ARENA_BYTES - offset {
            bail!(
                ErrorKind::StringArenaFull,
                "Message string buffer is full",
                format!(
                    "{} bytes requested for field {index}, {} of {STRING_ARENA_BYTES} bytes left",
                    value.len(),
                    STRING_ARENA_BYTES - offset
                )
            );
        }

        let end = offset + value.len();
        self.strings[offset..end].copy_from_slice(value);
        self.strings_used = end as u16;
        self.fields[index] = FieldSlot::Str {
            offset: offset as u16,
            len: value.len() as u16,
        };

        Ok(())
    }

    /// Returns field `index`, or [`None`] past [`MAX_FIELDS`].
    pub fn field(&self, index: usize) -> Option<FieldValue<'_>> {
        let value = match *self.fields.get(index)? {
            FieldSlot::Unset => FieldValue::Unset,
            FieldSlot::Int32(value) => FieldValue::Int32(value),
            FieldSlot::Int64(value) => FieldValue::Int64(value),
            FieldSlot::Str { offset, len } => {
                let start = offset as usize;
                FieldValue::Str(&self.strings[start..start + len as usize])
            }
        };

        Some(value)
    }

    pub fn get_i32(&self, index: usize) -> Option<i32> {
        match self.field(index)? {
            FieldValue::Int32(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_i64(&self, index: usize) -> Option<i64> {
        match self.field(index)? {
            FieldValue::Int64(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_str(&self, index: usize) -> Option<&[u8]> {
        match self.field(index)? {
            FieldValue::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Bytes still free in the string buffer.
    pub fn string_bytes_remaining(&self) -> usize {
        STRING_ARENA_BYTES - self.strings_used as usize
    }

    fn slot_mut(&mut self, index: usize) -> StreamResult<&mut FieldSlot> {
        let kind = self.kind;
        match self.fields.get_mut(index) {
            Some(slot) => Ok(slot),
            None => bail!(
                ErrorKind::FieldIndexOutOfRange,
                "Message field index out of range",
                format!("field {index} of {MAX_FIELDS} in a {kind} message")
            ),
        }
    }
}
