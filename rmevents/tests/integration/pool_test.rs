use std::time::Duration;

use rmevents::sink::MemorySink;
use rmevents::test_utils::system::{memory_system, test_config};
use rmevents_telemetry::tracing::init_test_tracing;

const POOL_CAPACITY: usize = 128;

#[test]
fn steady_state_runs_on_recycled_messages() {
    init_test_tracing();
    let sink = MemorySink::new();
    let (mut system, senders) = memory_system(test_config(2, POOL_CAPACITY), sink.clone());
    system.start().unwrap();

    // Batches are small enough that the fragments in flight never exhaust the pool.
    let mut id = 0;
    let mut fragments = 0;
    for batch in 1..=200 {
        for _ in 0..4 {
            let fan_out = id % 3;
            senders.send_complete_event(id, fan_out).unwrap();
            fragments += 3 + 2 * fan_out as u64;
            id += 1;
        }
        assert!(sink.wait_for_events(batch * 4, Duration::from_secs(10)));
    }

    system.shutdown_and_wait().unwrap();

    let stats = system.stats();
    assert_eq!(stats.fragments_dropped, 0);
    assert_eq!(stats.events_dispatched, 800);
    assert_eq!(stats.fragments_received, fragments);
    // Every fragment came from the pool, and the arena was never exhausted.
    assert_eq!(stats.messages_allocated + stats.messages_recycled, fragments);
    assert!(stats.messages_allocated < POOL_CAPACITY as u64);
    assert!(stats.messages_recycled > stats.messages_allocated);
}
