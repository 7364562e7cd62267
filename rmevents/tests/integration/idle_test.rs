use std::thread;
use std::time::{Duration, Instant};

use rmevents::sink::MemorySink;
use rmevents::test_utils::rows::{pending_event_row, resource_row, rm_node_row};
use rmevents::test_utils::system::{memory_system, test_config};
use rmevents_config::shared::WatchedTable;
use rmevents_telemetry::tracing::init_test_tracing;

const SLOW_POLL_TIMEOUT_MS: u64 = 3000;

#[test]
fn idle_listener_picks_up_rows_within_the_shortest_poll_timeout() {
    init_test_tracing();
    let mut config = test_config(2, 64);
    for source in &mut config.sources {
        source.poll_timeout_ms = match source.table {
            WatchedTable::PendingEvents => SLOW_POLL_TIMEOUT_MS,
            _ => 1,
        };
    }

    let sink = MemorySink::new();
    let (mut system, senders) = memory_system(config, sink.clone());
    system.start().unwrap();

    // Let the listener go idle before anything arrives.
    thread::sleep(Duration::from_millis(50));
    senders
        .send(WatchedTable::PendingEvents, pending_event_row(4, 0))
        .unwrap();
    thread::sleep(Duration::from_millis(200));
    senders.send(WatchedTable::RmNode, rm_node_row(4)).unwrap();
    senders
        .send(WatchedTable::Resource, resource_row(4))
        .unwrap();

    let sent = Instant::now();
    assert!(sink.wait_for_events(1, Duration::from_secs(10)));
    let latency = sent.elapsed();
    assert!(
        latency < Duration::from_millis(SLOW_POLL_TIMEOUT_MS / 3),
        "event completed after {latency:?}"
    );

    let stopping = Instant::now();
    system.shutdown_and_wait().unwrap();
    assert!(stopping.elapsed() < Duration::from_millis(SLOW_POLL_TIMEOUT_MS / 3));

    assert_eq!(sink.events()[0].correlation_id, 4);
    assert_eq!(system.stats().events_dispatched, 1);
}
