//! Fixed-size message objects and the arena they live in.

mod arena;
mod event;
mod kind;

pub use arena::{JoinIter, JoinList, MessageArena, MessageHandle, MessageId, MessageState};
pub use event::{EventMessage, FieldValue, MAX_FIELDS, STRING_ARENA_BYTES};
pub use kind::{
    MessageKind, NUMBER_MSG_KINDS, NUMBER_REPEATABLE_KINDS, NUMBER_SINGLETON_KINDS,
};

pub(crate) use arena::NIL;
