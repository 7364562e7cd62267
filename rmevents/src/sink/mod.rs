//! Outbound seam: where completed events go.

mod base;
mod event;
mod memory;

pub use base::EventSink;
pub use event::{CompletedEvent, FieldData, FragmentRecord, JoinedEvent};
pub use memory::MemorySink;
