use std::sync::Arc;

use metrics::{Counter, Gauge, counter, gauge};
use tracing::{debug, error, info, warn};

use crate::accumulator::{BucketRef, MessageAccumulator};
use crate::concurrency::dataflow::DataflowController;
use crate::concurrency::queue::{Dequeued, QueueHead};
use crate::concurrency::signal::ShutdownTrigger;
use crate::error::StreamResult;
use crate::failpoints::{HANDLER_DELIVER, stream_fail_point};
use crate::message::MessageArena;
use crate::metrics::{
    HANDLER_ID_LABEL, RMEVENTS_EVENTS_DISPATCHED_TOTAL, RMEVENTS_PENDING_BUCKETS,
    RMEVENTS_SINK_FAILURES_TOTAL,
};
use crate::pool::RemoteSide;
use crate::sink::{EventSink, JoinedEvent};
use crate::stats::HandlerStats;
use crate::workers::base::{ThreadHandle, Worker, WorkerType};

/// What a handler leaves behind once its loop exits, whether it stopped or failed.
#[derive(Debug)]
pub struct HandlerOutcome {
    /// How the handler loop ended.
    pub result: StreamResult<()>,
    /// The handler's inbound queues, still holding whatever was not consumed.
    pub inbound: Vec<QueueHead>,
    /// Buckets still waiting for fragments when the handler stopped.
    pub pending_buckets: usize,
}

/// Joins the fragments routed to one handler and hands completed events to its sink.
pub struct HandlerWorker<S> {
    id: u16,
    inbound: Vec<QueueHead>,
    cursor: usize,
    remote: RemoteSide,
    accumulator: MessageAccumulator,
    controller: Arc<DataflowController>,
    arena: Arc<MessageArena>,
    sink: S,
    shutdown: ShutdownTrigger,
    stats: HandlerStats,
    dispatched: Counter,
    sink_failures: Counter,
    pending: Gauge,
}

impl<S> HandlerWorker<S>
where
    S: EventSink + Send + 'static,
{
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        id: u16,
        inbound: Vec<QueueHead>,
        remote: RemoteSide,
        accumulator: MessageAccumulator,
        controller: Arc<DataflowController>,
        arena: Arc<MessageArena>,
        sink: S,
        shutdown: ShutdownTrigger,
        stats: HandlerStats,
    ) -> Self {
        let label = id.to_string();

        Self {
            id,
            inbound,
            cursor: 0,
            remote,
            accumulator,
            controller,
            arena,
            sink,
            shutdown,
            stats,
            dispatched: counter!(
                RMEVENTS_EVENTS_DISPATCHED_TOTAL,
                HANDLER_ID_LABEL => label.clone()
            ),
            sink_failures: counter!(
                RMEVENTS_SINK_FAILURES_TOTAL,
                HANDLER_ID_LABEL => label.clone()
            ),
            pending: gauge!(RMEVENTS_PENDING_BUCKETS, HANDLER_ID_LABEL => label),
        }
    }

    fn run(mut self) -> HandlerOutcome {
        let _panic_guard = self.shutdown.guard_panics();

        info!(handler_id = self.id, sink = S::name(), "handler started");

        let result = self.run_loop();
        if let Err(err) = &result {
            error!(
                handler_id = self.id,
                error = %err,
                "handler failed, shutting down the system"
            );
            self.shutdown.trigger();
        }

        if let Err(err) = self.sink.shutdown() {
            warn!(handler_id = self.id, error = %err, "failed to shut down sink");
        }

        let pending_buckets = self.accumulator.len();
        if pending_buckets > 0 {
            debug!(
                handler_id = self.id,
                pending_buckets, "handler stopped with incomplete events"
            );
        }
        info!(handler_id = self.id, "handler stopped");

        HandlerOutcome {
            result,
            inbound: self.inbound,
            pending_buckets,
        }
    }

    fn run_loop(&mut self) -> StreamResult<()> {
        while self.shutdown.is_running() {
            match self.next_fragment() {
                Some(dequeued) => self.process(dequeued)?,
                None => self.block_until_data(),
            }
        }

        Ok(())
    }

    /// Dequeues from the inbound queues round-robin, starting after the last one used.
    fn next_fragment(&mut self) -> Option<Dequeued> {
        let queues = self.inbound.len();
        for step in 1..=queues {
            let index = (self.cursor + step) % queues;
            if let Some(dequeued) = self.inbound[index].dequeue() {
                self.cursor = index;
                return Some(dequeued);
            }
        }

        None
    }

    fn block_until_data(&self) {
        let mut about_to_block = self.controller.waiting_for_data();
        loop {
            let has_data = self.inbound.iter().any(|queue| !queue.is_empty());
            if has_data || !self.shutdown.is_running() {
                about_to_block.resume_with_data();
                return;
            }

            about_to_block = about_to_block.wait_for_data();
        }
    }

    fn process(&mut self, dequeued: Dequeued) -> StreamResult<()> {
        let Dequeued {
            message,
            previous_stub,
        } = dequeued;
        self.remote.release_queue_stub(previous_stub)?;

        let correlation_id = self.arena.message(&message).correlation_id();
        let bucket = self.accumulator.lookup(correlation_id);
        let complete = self.accumulator.accept_fragment(bucket, message, &self.arena)?;

        if complete {
            self.dispatch(bucket)?;

            let mut completed = self.accumulator.remove(bucket)?;
            let remote = &mut self.remote;
            completed.release_messages(&self.arena, |handle| remote.release_handled(handle))?;
        }

        let pending = self.accumulator.len();
        self.stats.set_pending_buckets(pending);
        self.pending.set(pending as f64);

        Ok(())
    }

    /// Hands the completed event in `bucket` to the sink. Sink failures are not fatal.
    fn dispatch(&mut self, bucket: BucketRef) -> StreamResult<()> {
        let event = JoinedEvent::new(&self.arena, self.accumulator.bucket(bucket))?;
        let correlation_id = event.correlation_id();

        let delivered =
            stream_fail_point(HANDLER_DELIVER).and_then(|()| self.sink.deliver(event));
        match delivered {
            Ok(()) => {
                self.stats.event_dispatched();
                self.dispatched.increment(1);
            }
            Err(err) => {
                warn!(
                    handler_id = self.id,
                    correlation_id,
                    error = %err,
                    "sink failed to accept completed event"
                );
                self.stats.sink_failed();
                self.sink_failures.increment(1);
            }
        }

        Ok(())
    }
}

impl<S> Worker for HandlerWorker<S>
where
    S: EventSink + Send + 'static,
{
    type Handle = ThreadHandle<HandlerOutcome>;

    fn start(self) -> StreamResult<Self::Handle> {
        let worker_type = WorkerType::Handler { id: self.id };
        ThreadHandle::spawn(worker_type, move || Ok(self.run()))
    }
}
