use crate::error::StreamResult;
use crate::sink::event::JoinedEvent;

/// Receives every completed event of one handler.
///
/// Each handler owns its own sink instance, so implementations need no internal locking
/// unless they share state across handlers.
pub trait EventSink {
    /// Returns the name of the sink, used in logs.
    fn name() -> &'static str;

    /// Consumes one completed event.
    ///
    /// The event borrows the joined messages, which are reclaimed as soon as this returns.
    /// An error is logged and counted, and the event is not retried.
    fn deliver(&mut self, event: JoinedEvent<'_>) -> StreamResult<()>;

    /// Called once when the owning handler exits.
    fn shutdown(&mut self) -> StreamResult<()> {
        Ok(())
    }
}
