//! Inbound seam: where row changes of the watched tables come from.

mod base;
mod memory;

pub use base::{ChangeSource, ColumnValue, RowChange};
pub use memory::{MemorySource, MemorySourceSender, OwnedValue};
