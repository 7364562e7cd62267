//! Counters readable from outside the worker threads while the system runs.
//!
//! Every worker owns its own counters and only ever increments them, so readers get a
//! slightly stale but consistent-enough view without any synchronization on the hot path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct ListenerCounters {
    fragments_received: AtomicU64,
    fragments_dropped: AtomicU64,
    messages_allocated: AtomicU64,
    messages_recycled: AtomicU64,
    wakeups_delivered: AtomicU64,
}

/// Counters written by the listener thread.
#[derive(Debug, Clone, Default)]
pub struct ListenerStats {
    counters: Arc<ListenerCounters>,
}

impl ListenerStats {
    pub(crate) fn fragment_received(&self) {
        self.counters
            .fragments_received
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fragment_dropped(&self) {
        self.counters
            .fragments_dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn wakeup_delivered(&self) {
        self.counters
            .wakeups_delivered
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Publishes the pool's running totals.
    pub(crate) fn set_pool_totals(&self, allocated: u64, recycled: u64) {
        self.counters
            .messages_allocated
            .store(allocated, Ordering::Relaxed);
        self.counters
            .messages_recycled
            .store(recycled, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct HandlerCounters {
    events_dispatched: AtomicU64,
    sink_failures: AtomicU64,
    pending_buckets: AtomicU64,
}

/// Counters written by one handler thread.
#[derive(Debug, Clone, Default)]
pub struct HandlerStats {
    counters: Arc<HandlerCounters>,
}

impl HandlerStats {
    pub(crate) fn event_dispatched(&self) {
        self.counters
            .events_dispatched
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sink_failed(&self) {
        self.counters.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_pending_buckets(&self, pending: usize) {
        self.counters
            .pending_buckets
            .store(pending as u64, Ordering::Relaxed);
    }
}

/// Point-in-time totals of a streaming system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemStats {
    pub fragments_received: u64,
    pub fragments_dropped: u64,
    /// Fragments still queued for a handler when the system stopped.
    pub fragments_discarded: u64,
    pub events_dispatched: u64,
    pub sink_failures: u64,
    pub messages_allocated: u64,
    pub messages_recycled: u64,
    pub wakeups_delivered: u64,
    pub pending_buckets: u64,
}

impl SystemStats {
    pub(crate) fn collect(listener: &ListenerStats, handlers: &[HandlerStats]) -> Self {
        let listener = &listener.counters;
        let mut stats = SystemStats {
            fragments_received: listener.fragments_received.load(Ordering::Relaxed),
            fragments_dropped: listener.fragments_dropped.load(Ordering::Relaxed),
            messages_allocated: listener.messages_allocated.load(Ordering::Relaxed),
            messages_recycled: listener.messages_recycled.load(Ordering::Relaxed),
            wakeups_delivered: listener.wakeups_delivered.load(Ordering::Relaxed),
            ..SystemStats::default()
        };

        for handler in handlers {
            let handler = &handler.counters;
            stats.events_dispatched += handler.events_dispatched.load(Ordering::Relaxed);
            stats.sink_failures += handler.sink_failures.load(Ordering::Relaxed);
            stats.pending_buckets += handler.pending_buckets.load(Ordering::Relaxed);
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_sums_handler_counters() {
        let listener = ListenerStats::default();
        let handlers = [HandlerStats::default(), HandlerStats::default()];

        listener.fragment_received();
        listener.fragment_received();
        listener.fragment_dropped();
        listener.set_pool_totals(5, 9);
        handlers[0].event_dispatched();
        handlers[1].event_dispatched();
        handlers[1].sink_failed();
        handlers[0].set_pending_buckets(3);

        assert_eq!(
            SystemStats::collect(&listener, &handlers),
            SystemStats {
                fragments_received: 2,
                fragments_dropped: 1,
                fragments_discarded: 0,
                events_dispatched: 2,
                sink_failures: 1,
                messages_allocated: 5,
                messages_recycled: 9,
                wakeups_delivered: 0,
                pending_buckets: 3,
            }
        );
    }
}
