use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rmevents_config::shared::{
    HandlerConfig, ListenerConfig, PoolConfig, SourceConfig, StreamingConfig, WatchedTable,
};

use crate::error::StreamResult;
use crate::sink::EventSink;
use crate::source::{MemorySource, MemorySourceSender, OwnedValue};
use crate::system::StreamingSystem;
use crate::test_utils::rows::complete_event_rows;

/// Senders feeding the memory source of every watched table.
#[derive(Debug, Clone)]
pub struct SourceSenders {
    senders: Vec<(WatchedTable, MemorySourceSender)>,
}

impl SourceSenders {
    pub fn send(&self, table: WatchedTable, row: Vec<OwnedValue>) -> StreamResult<()> {
        let (_, sender) = self
            .senders
            .iter()
            .find(|(existing, _)| *existing == table)
            .expect("every watched table has a sender");
        sender.send(row)
    }

    pub fn send_complete_event(&self, id: i32, fan_out: i32) -> StreamResult<()> {
        for (table, row) in complete_event_rows(id, fan_out) {
            self.send(table, row)?;
        }

        Ok(())
    }
}

/// A small configuration suitable for tests.
pub fn test_config(handlers: usize, pool_capacity: usize) -> StreamingConfig {
    StreamingConfig {
        handlers: HandlerConfig {
            count: handlers,
            accumulator_size_bits: 8,
        },
        pool: PoolConfig {
            capacity: pool_capacity,
        },
        listener: ListenerConfig {
            max_events_per_poll: 64,
        },
        sources: WatchedTable::ALL
            .into_iter()
            .map(|table| SourceConfig {
                table,
                poll_timeout_ms: 2,
            })
            .collect(),
    }
}

/// Builds a system with a memory source registered for every watched table.
pub fn memory_system<S>(config: StreamingConfig, sink: S) -> (StreamingSystem<S>, SourceSenders)
where
    S: EventSink + Clone + Send + 'static,
{
    let mut system = StreamingSystem::new(Arc::new(config), sink);
    let mut senders = Vec::with_capacity(WatchedTable::ALL.len());
    for table in WatchedTable::ALL {
        let (sender, source) = MemorySource::channel();
        system
            .add_source(table, source)
            .expect("system was not started yet");
        senders.push((table, sender));
    }

    (system, SourceSenders { senders })
}

/// Polls `condition` until it holds or `timeout` elapses. Returns whether it held.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }

    condition()
}
