use std::time::Duration;

use crate::error::StreamResult;

/// One decoded column value of a row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnValue<'a> {
    Null,
    Int32(i32),
    Int64(i64),
    Bytes(&'a [u8]),
}

/// A row-level change notification, decoded into columns addressed by index.
#[derive(Debug, Clone, Copy)]
pub struct RowChange<'a> {
    columns: &'a [ColumnValue<'a>],
}

impl<'a> RowChange<'a> {
    pub fn new(columns: &'a [ColumnValue<'a>]) -> Self {
        Self { columns }
    }

    /// Returns column `index`, or [`None`] if the row has fewer columns.
    pub fn column(&self, index: usize) -> Option<ColumnValue<'a>> {
        self.columns.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A subscription to the row changes of one watched table.
///
/// Sources are owned and polled by the listener thread only.
pub trait ChangeSource: Send {
    /// Delivers up to `max_events` pending row changes to `visitor` and returns how many
    /// were delivered.
    ///
    /// A zero `timeout` never blocks. Otherwise the call may block up to `timeout` waiting
    /// for the first change.
    fn poll(
        &mut self,
        timeout: Duration,
        max_events: usize,
        visitor: &mut dyn FnMut(&RowChange<'_>),
    ) -> StreamResult<usize>;

    /// Called once when the listener exits.
    fn shutdown(&mut self) -> StreamResult<()> {
        Ok(())
    }
}
