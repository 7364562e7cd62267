use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::bail;
use crate::error::{ErrorKind, StreamResult};
use crate::source::base::{ChangeSource, ColumnValue, RowChange};

/// Owned form of a [`ColumnValue`], used to queue rows in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedValue {
    Null,
    Int32(i32),
    Int64(i64),
    Bytes(Vec<u8>),
}

impl OwnedValue {
    pub fn text(value: impl Into<String>) -> Self {
        OwnedValue::Bytes(value.into().into_bytes())
    }

    pub fn as_column(&self) -> ColumnValue<'_> {
        match self {
            OwnedValue::Null => ColumnValue::Null,
            OwnedValue::Int32(value) => ColumnValue::Int32(*value),
            OwnedValue::Int64(value) => ColumnValue::Int64(*value),
            OwnedValue::Bytes(value) => ColumnValue::Bytes(value),
        }
    }
}

/// Sending end of a [`MemorySource`]. Cloneable, usable from any thread.
#[derive(Debug, Clone)]
pub struct MemorySourceSender {
    sender: Sender<Vec<OwnedValue>>,
}

impl MemorySourceSender {
    pub fn send(&self, row: Vec<OwnedValue>) -> StreamResult<()> {
        if self.sender.send(row).is_err() {
            bail!(
                ErrorKind::SourceError,
                "Memory source was dropped",
                "the listener is no longer polling this source"
            );
        }

        Ok(())
    }
}

/// Channel-backed change source for tests and demos.
///
/// Once every sender is dropped the source behaves as permanently idle.
#[derive(Debug)]
pub struct MemorySource {
    receiver: Receiver<Vec<OwnedValue>>,
}

impl MemorySource {
    pub fn channel() -> (MemorySourceSender, MemorySource) {
        let (sender, receiver) = mpsc::channel();
        (MemorySourceSender { sender }, MemorySource { receiver })
    }
}

fn visit(row: &[OwnedValue], visitor: &mut dyn FnMut(&RowChange<'_>)) {
    let columns = row.iter().map(OwnedValue::as_column).collect::<Vec<_>>();
    visitor(&RowChange::new(&columns));
}

impl ChangeSource for MemorySource {
    fn poll(
        &mut self,
        timeout: Duration,
        max_events: usize,
        visitor: &mut dyn FnMut(&RowChange<'_>),
    ) -> StreamResult<usize> {
        if max_events == 0 {
            return Ok(0);
        }

        let first = if timeout.is_zero() {
            match self.receiver.try_recv() {
                Ok(row) => row,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(0),
            }
        } else {
            match self.receiver.recv_timeout(timeout) {
                Ok(row) => row,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    // Keep blocking polls blocking so an idle listener does not spin.
                    thread::sleep(timeout);
                    return Ok(0);
                }
            }
        };

        visit(&first, visitor);
        let mut delivered = 1;

        while delivered < max_events {
            match self.receiver.try_recv() {
                Ok(row) => {
                    visit(&row, visitor);
                    delivered += 1;
                }
                Err(_) => break,
            }
        }

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_blocking_poll_on_empty_source_returns_nothing() {
        let (_sender, mut source) = MemorySource::channel();

        let delivered = source
            .poll(Duration::ZERO, 8, &mut |_: &RowChange<'_>| {
                panic!("no rows queued")
            })
            .unwrap();

        assert_eq!(delivered, 0);
    }

    #[test]
    fn poll_respects_max_events() {
        let (sender, mut source) = MemorySource::channel();
        for id in 0..5 {
            sender
                .send(vec![OwnedValue::Int32(id), OwnedValue::text("x")])
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut visitor = |row: &RowChange<'_>| {
            if let Some(ColumnValue::Int32(id)) = row.column(0) {
                seen.push(id);
            }
        };
        assert_eq!(source.poll(Duration::ZERO, 3, &mut visitor).unwrap(), 3);
        assert_eq!(source.poll(Duration::ZERO, 3, &mut visitor).unwrap(), 2);

        assert_eq!(seen, (0..5).collect::<Vec<_>>());
    }

    #[test]
    fn blocking_poll_times_out() {
        let (_sender, mut source) = MemorySource::channel();

        let delivered = source
            .poll(Duration::from_millis(5), 8, &mut |_: &RowChange<'_>| {})
            .unwrap();

        assert_eq!(delivered, 0);
    }

    #[test]
    fn sending_to_dropped_source_fails() {
        let (sender, source) = MemorySource::channel();
        drop(source);

        assert_eq!(
            sender.send(vec![]).unwrap_err().kind(),
            ErrorKind::SourceError
        );
    }
}
