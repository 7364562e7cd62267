//! Metric names, labels and registration for the streaming core.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};

static REGISTER_METRICS: Once = Once::new();

/// Label holding the handler a metric was recorded by.
pub const HANDLER_ID_LABEL: &str = "handler_id";

/// Label holding the watched table a fragment came from.
pub const TABLE_LABEL: &str = "table";

/// Label holding why a fragment was dropped.
pub const REASON_LABEL: &str = "reason";

/// Row changes received by the listener.
pub const RMEVENTS_FRAGMENTS_RECEIVED_TOTAL: &str = "rmevents_fragments_received_total";

/// Row changes that could not be turned into a message and were dropped.
pub const RMEVENTS_FRAGMENTS_DROPPED_TOTAL: &str = "rmevents_fragments_dropped_total";

/// Completed events handed to the sink.
pub const RMEVENTS_EVENTS_DISPATCHED_TOTAL: &str = "rmevents_events_dispatched_total";

/// Sink deliveries that returned an error.
pub const RMEVENTS_SINK_FAILURES_TOTAL: &str = "rmevents_sink_failures_total";

/// Message objects taken from the unused part of the arena.
pub const RMEVENTS_MESSAGES_ALLOCATED_TOTAL: &str = "rmevents_messages_allocated_total";

/// Message objects reused through a return queue.
pub const RMEVENTS_MESSAGES_RECYCLED_TOTAL: &str = "rmevents_messages_recycled_total";

/// Blocked handlers woken by the listener.
pub const RMEVENTS_WAKEUPS_DELIVERED_TOTAL: &str = "rmevents_wakeups_delivered_total";

/// Buckets currently waiting for fragments in one handler.
pub const RMEVENTS_PENDING_BUCKETS: &str = "rmevents_pending_buckets";

/// Registers descriptions for every metric above. Safe to call more than once.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            RMEVENTS_FRAGMENTS_RECEIVED_TOTAL,
            Unit::Count,
            "Row changes received from the watched tables, labeled by table"
        );
        describe_counter!(
            RMEVENTS_FRAGMENTS_DROPPED_TOTAL,
            Unit::Count,
            "Row changes dropped before reaching a handler, labeled by table and reason"
        );
        describe_counter!(
            RMEVENTS_EVENTS_DISPATCHED_TOTAL,
            Unit::Count,
            "Completed events delivered to the sink, labeled by handler_id"
        );
        describe_counter!(
            RMEVENTS_SINK_FAILURES_TOTAL,
            Unit::Count,
            "Completed events the sink failed to accept, labeled by handler_id"
        );
        describe_counter!(
            RMEVENTS_MESSAGES_ALLOCATED_TOTAL,
            Unit::Count,
            "Message objects taken fresh from the arena"
        );
        describe_counter!(
            RMEVENTS_MESSAGES_RECYCLED_TOTAL,
            Unit::Count,
            "Message objects reused through the return queues"
        );
        describe_counter!(
            RMEVENTS_WAKEUPS_DELIVERED_TOTAL,
            Unit::Count,
            "Blocked handlers signalled by the listener, labeled by handler_id"
        );
        describe_gauge!(
            RMEVENTS_PENDING_BUCKETS,
            Unit::Count,
            "Buckets waiting for more fragments, labeled by handler_id"
        );
    });
}
