use std::time::Duration;

use rmevents::failpoints::{HANDLER_DELIVER, LISTENER_BUILD_FRAGMENT};
use rmevents::sink::MemorySink;
use rmevents::test_utils::failpoints::StreamFailScenario;
use rmevents::test_utils::system::{memory_system, test_config, wait_until};
use rmevents_telemetry::tracing::init_test_tracing;

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn failed_fragment_build_drops_only_that_fragment() {
    init_test_tracing();
    let scenario = StreamFailScenario::setup(&[(LISTENER_BUILD_FRAGMENT, "1*return->off")]);

    let sink = MemorySink::new();
    let (mut system, senders) = memory_system(test_config(2, 64), sink.clone());
    system.start().unwrap();

    // The first fragment of event 1 is dropped, so it can never complete.
    senders.send_complete_event(1, 1).unwrap();
    assert!(wait_until(TIMEOUT, || system.stats().fragments_received == 5));

    senders.send_complete_event(2, 1).unwrap();
    assert!(sink.wait_for_events(1, TIMEOUT));

    system.shutdown_and_wait().unwrap();
    scenario.teardown();

    let stats = system.stats();
    assert_eq!(stats.fragments_dropped, 1);
    assert_eq!(stats.events_dispatched, 1);
    assert_eq!(sink.events()[0].correlation_id, 2);
}

#[test]
fn failed_delivery_still_reclaims_messages() {
    init_test_tracing();
    let scenario = StreamFailScenario::setup(&[(HANDLER_DELIVER, "return")]);

    let sink = MemorySink::new();
    let (mut system, senders) = memory_system(test_config(1, 32), sink.clone());
    system.start().unwrap();

    // Far more fragments than the pool holds, so this only passes if messages come back.
    for id in 0..40 {
        senders.send_complete_event(id, 2).unwrap();
        assert!(wait_until(TIMEOUT, || {
            system.stats().sink_failures == id as u64 + 1
        }));
    }

    system.shutdown_and_wait().unwrap();
    scenario.teardown();

    let stats = system.stats();
    assert_eq!(stats.sink_failures, 40);
    assert_eq!(stats.events_dispatched, 0);
    assert_eq!(stats.fragments_dropped, 0);
    assert_eq!(sink.event_count(), 0);
    assert!(stats.messages_recycled > 0);
}
