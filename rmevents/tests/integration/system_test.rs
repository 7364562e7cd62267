use std::collections::BTreeMap;
use std::time::Duration;

use rmevents::error::ErrorKind;
use rmevents::sink::{FieldData, MemorySink};
use rmevents::source::OwnedValue;
use rmevents::test_utils::rows::{container_status_row, rm_node_row};
use rmevents::test_utils::system::{memory_system, test_config, wait_until};
use rmevents_config::shared::WatchedTable;
use rmevents_telemetry::tracing::init_test_tracing;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn fragments_are_joined_into_completed_events() {
    init_test_tracing();
    let sink = MemorySink::new();
    let (mut system, senders) = memory_system(test_config(3, 512), sink.clone());
    system.start().unwrap();

    let mut expected_fragments = 0;
    for id in 0..60 {
        let fan_out = id % 4;
        senders.send_complete_event(id, fan_out).unwrap();
        expected_fragments += 3 + 2 * fan_out as u64;
    }

    assert!(sink.wait_for_events(60, EVENT_TIMEOUT));
    system.shutdown_and_wait().unwrap();

    let events = sink
        .events()
        .into_iter()
        .map(|event| (event.correlation_id, event))
        .collect::<BTreeMap<_, _>>();
    assert_eq!(events.len(), 60);

    for (id, event) in &events {
        let fan_out = (id % 4) as usize;
        assert_eq!(event.updated_container_infos.len(), fan_out);
        assert_eq!(event.container_statuses.len(), fan_out);
        assert_eq!(
            event.pending_event.get("contains"),
            Some(&FieldData::Int32(fan_out as i32))
        );
        assert_eq!(
            event.rm_node.get("hostname"),
            Some(&FieldData::Text(format!("host-{id}.example.com")))
        );
        assert_eq!(event.resource.get("memory"), Some(&FieldData::Int32(4096)));
    }

    let stats = system.stats();
    assert_eq!(stats.fragments_received, expected_fragments);
    assert_eq!(stats.fragments_dropped, 0);
    assert_eq!(stats.fragments_discarded, 0);
    assert_eq!(stats.events_dispatched, 60);
    assert_eq!(stats.pending_buckets, 0);
}

#[test]
fn completed_events_serialize_with_named_fields() {
    init_test_tracing();
    let sink = MemorySink::new();
    let (mut system, senders) = memory_system(test_config(1, 64), sink.clone());
    system.start().unwrap();

    senders.send_complete_event(9, 1).unwrap();
    assert!(sink.wait_for_events(1, EVENT_TIMEOUT));
    system.shutdown_and_wait().unwrap();

    let json = serde_json::to_value(&sink.events()[0]).unwrap();
    assert_eq!(json["correlation_id"], 9);
    assert_eq!(json["pending_event"]["kind"], "pending_event");
    assert_eq!(json["container_statuses"][0]["fields"][4][0], "diagnostics");
    assert!(json["container_statuses"][0]["fields"][4][1].is_null());
}

#[test]
fn malformed_rows_are_dropped_without_stopping_the_system() {
    init_test_tracing();
    let sink = MemorySink::new();
    let (mut system, senders) = memory_system(test_config(2, 128), sink.clone());
    system.start().unwrap();

    // Diagnostics too long for the message string buffer.
    let mut oversized = container_status_row(7, 0);
    oversized[4] = OwnedValue::Bytes(vec![b'x'; 1024]);
    senders
        .send(WatchedTable::ContainerStatus, oversized)
        .unwrap();

    // Correlation id of the wrong type.
    let mut mistyped = rm_node_row(7);
    mistyped[8] = OwnedValue::text("seven");
    senders.send(WatchedTable::RmNode, mistyped).unwrap();

    // Too few columns.
    senders
        .send(WatchedTable::Resource, vec![OwnedValue::Int32(1)])
        .unwrap();

    assert!(wait_until(EVENT_TIMEOUT, || system.stats().fragments_dropped == 3));

    senders.send_complete_event(8, 2).unwrap();
    assert!(sink.wait_for_events(1, EVENT_TIMEOUT));

    system.shutdown_and_wait().unwrap();

    let stats = system.stats();
    assert_eq!(stats.fragments_received, 3 + 7);
    assert_eq!(stats.fragments_dropped, 3);
    assert_eq!(stats.events_dispatched, 1);
    assert_eq!(sink.events()[0].correlation_id, 8);
}

#[test]
fn incomplete_events_stay_pending() {
    init_test_tracing();
    let sink = MemorySink::new();
    let (mut system, senders) = memory_system(test_config(2, 64), sink.clone());
    system.start().unwrap();

    senders.send(WatchedTable::RmNode, rm_node_row(4)).unwrap();
    senders.send(WatchedTable::RmNode, rm_node_row(5)).unwrap();
    senders.send_complete_event(6, 0).unwrap();

    assert!(sink.wait_for_events(1, EVENT_TIMEOUT));
    assert!(wait_until(EVENT_TIMEOUT, || system.stats().pending_buckets == 2));

    system.shutdown_and_wait().unwrap();
    assert_eq!(sink.event_count(), 1);
}

#[test]
fn sink_failures_are_counted_and_not_retried() {
    init_test_tracing();
    let sink = MemorySink::new();
    sink.fail_next_deliveries(2);
    let (mut system, senders) = memory_system(test_config(1, 64), sink.clone());
    system.start().unwrap();

    for id in 0..5 {
        senders.send_complete_event(id, 1).unwrap();
    }

    assert!(sink.wait_for_events(3, EVENT_TIMEOUT));
    system.shutdown_and_wait().unwrap();

    let stats = system.stats();
    assert_eq!(stats.sink_failures, 2);
    assert_eq!(stats.events_dispatched, 3);
    assert_eq!(sink.event_count(), 3);
}

#[test]
fn system_starts_only_once() {
    init_test_tracing();
    let (mut system, _senders) = memory_system(test_config(1, 16), MemorySink::new());

    system.start().unwrap();
    assert_eq!(system.start().unwrap_err().kind(), ErrorKind::InvalidState);

    system.shutdown_and_wait().unwrap();
    assert_eq!(system.start().unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
fn start_requires_a_source_for_every_table() {
    init_test_tracing();
    let mut system = rmevents::StreamingSystem::new(
        std::sync::Arc::new(test_config(1, 16)),
        MemorySink::new(),
    );
    let (_sender, source) = rmevents::source::MemorySource::channel();
    system.add_source(WatchedTable::RmNode, source).unwrap();

    assert_eq!(system.start().unwrap_err().kind(), ErrorKind::ConfigError);
}

#[test]
fn invalid_configuration_is_rejected_at_start() {
    init_test_tracing();
    let (mut system, _senders) = memory_system(test_config(4, 8), MemorySink::new());

    assert_eq!(system.start().unwrap_err().kind(), ErrorKind::ConfigError);
}

#[test]
fn waiting_on_a_system_that_never_started_is_a_no_op() {
    init_test_tracing();
    let (mut system, _senders) = memory_system(test_config(1, 16), MemorySink::new());

    system.shutdown();
    system.wait().unwrap();
}
