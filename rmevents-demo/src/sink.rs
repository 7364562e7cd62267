use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rmevents::error::{ErrorKind, StreamResult};
use rmevents::sink::{EventSink, JoinedEvent};
use rmevents::stream_error;
use tracing::info;

/// Counts completed events and optionally logs each one as JSON.
#[derive(Debug, Clone)]
pub struct LogSink {
    delivered: Arc<AtomicU64>,
    log_events: bool,
}

impl LogSink {
    pub fn new(log_events: bool) -> Self {
        Self {
            delivered: Arc::new(AtomicU64::new(0)),
            log_events,
        }
    }

    /// Events delivered by every clone of this sink.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl EventSink for LogSink {
    fn name() -> &'static str {
        "log"
    }

    fn deliver(&mut self, event: JoinedEvent<'_>) -> StreamResult<()> {
        if self.log_events {
            let json = serde_json::to_string(&event.to_completed()).map_err(|err| {
                stream_error!(
                    ErrorKind::SinkError,
                    "Failed to serialize completed event",
                    format!("correlation id {}", event.correlation_id()),
                    source: err
                )
            })?;
            info!(correlation_id = event.correlation_id(), event = %json, "completed event");
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }
}
