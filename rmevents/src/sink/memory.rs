use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, StreamResult};
use crate::sink::base::EventSink;
use crate::sink::event::{CompletedEvent, JoinedEvent};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<CompletedEvent>,
    failures_to_inject: usize,
}

/// In-memory sink for testing and development purposes.
///
/// Clones share storage, so one instance per handler still collects every event of the
/// system in one place.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<(Mutex<Inner>, Condvar)>,
}

impl MemorySink {
    /// Creates a new empty memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event delivered so far.
    pub fn events(&self) -> Vec<CompletedEvent> {
        self.lock().events.clone()
    }

    pub fn event_count(&self) -> usize {
        self.lock().events.len()
    }

    /// Makes the next `count` deliveries fail with [`ErrorKind::SinkError`].
    pub fn fail_next_deliveries(&self, count: usize) {
        self.lock().failures_to_inject = count;
    }

    /// Blocks until at least `count` events were delivered or `timeout` elapses.
    ///
    /// Returns whether the count was reached.
    pub fn wait_for_events(&self, count: usize, timeout: Duration) -> bool {
        let (lock, delivered) = &*self.inner;
        let deadline = Instant::now() + timeout;

        let mut inner = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while inner.events.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            inner = delivered
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        true
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for MemorySink {
    fn name() -> &'static str {
        "memory"
    }

    fn deliver(&mut self, event: JoinedEvent<'_>) -> StreamResult<()> {
        let mut inner = self.lock();
        if inner.failures_to_inject > 0 {
            inner.failures_to_inject -= 1;
            bail!(
                ErrorKind::SinkError,
                "Memory sink rejected the event",
                format!("correlation id {}", event.correlation_id())
            );
        }

        info!(
            correlation_id = event.correlation_id(),
            fan_out = event.fan_out(),
            "delivering completed event to memory sink"
        );
        inner.events.push(event.to_completed());
        self.inner.1.notify_all();

        Ok(())
    }

    fn shutdown(&mut self) -> StreamResult<()> {
        info!(events = self.lock().events.len(), "memory sink shutting down");

        Ok(())
    }
}
