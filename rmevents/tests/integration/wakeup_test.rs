use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rmevents::concurrency::dataflow::DataflowController;
use rmevents::concurrency::queue::{self, QueueHead};
use rmevents::message::{MessageArena, MessageKind};
use rmevents_telemetry::tracing::init_test_tracing;

const PRODUCERS: usize = 3;
const MESSAGES_PER_PRODUCER: i32 = 2_000;

/// Consumes from every queue until `expected` messages arrived, blocking whenever all
/// queues are empty.
fn consume(
    arena: &MessageArena,
    controller: &DataflowController,
    mut heads: Vec<QueueHead>,
    expected: usize,
) -> Vec<Vec<i32>> {
    let mut received = vec![Vec::new(); heads.len()];
    let mut total = 0;

    while total < expected {
        let mut progressed = false;
        for (head, received) in heads.iter_mut().zip(&mut received) {
            if let Some(dequeued) = head.dequeue() {
                received.push(arena.message(&dequeued.message).correlation_id());
                total += 1;
                progressed = true;
            }
        }
        if progressed {
            continue;
        }

        let mut about_to_block = controller.waiting_for_data();
        while heads.iter().all(|head| head.is_empty()) {
            about_to_block = about_to_block.wait_for_data();
        }
        about_to_block.resume_with_data();
    }

    received
}

#[test]
fn consumer_never_misses_a_wakeup() {
    init_test_tracing();

    let total = PRODUCERS * MESSAGES_PER_PRODUCER as usize;
    let arena = Arc::new(MessageArena::with_capacity(total + PRODUCERS));
    let controller = Arc::new(DataflowController::new());

    let mut tails = Vec::new();
    let mut heads = Vec::new();
    for _ in 0..PRODUCERS {
        let sentinel = arena.allocate(0).unwrap();
        let (tail, head) = queue::channel(Arc::clone(&arena), sentinel);
        tails.push(tail);
        heads.push(head);
    }

    let (done_tx, done_rx) = mpsc::channel();
    let consumer_arena = Arc::clone(&arena);
    let consumer_controller = Arc::clone(&controller);
    let consumer = thread::spawn(move || {
        let received = consume(&consumer_arena, &consumer_controller, heads, total);
        done_tx.send(received).unwrap();
    });

    let producers = tails
        .into_iter()
        .enumerate()
        .map(|(index, mut tail)| {
            let arena = Arc::clone(&arena);
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(index as u64);
                for id in 0..MESSAGES_PER_PRODUCER {
                    let mut handle = arena.allocate(index as u16).unwrap();
                    arena
                        .message_mut(&mut handle)
                        .reinit(MessageKind::Resource, id);
                    tail.enqueue(handle);

                    // Alternate between bursts and idle gaps so the consumer keeps blocking.
                    if rng.gen_bool(0.7) {
                        controller.check_consumer();
                    } else {
                        controller.check_consumer_sync();
                        thread::sleep(Duration::from_micros(rng.gen_range(0..200)));
                    }
                }
                controller.check_consumer_sync();
            })
        })
        .collect::<Vec<_>>();

    for producer in producers {
        producer.join().unwrap();
    }

    let received = done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("consumer stayed blocked although data was available");
    consumer.join().unwrap();

    for per_producer in received {
        assert_eq!(per_producer, (0..MESSAGES_PER_PRODUCER).collect::<Vec<_>>());
    }
}
