//! Static descriptions of the watched tables and of how their rows map onto message fields.

mod tables;

pub use tables::{ColumnRole, ColumnType, WatchColumn, WatchTable};
