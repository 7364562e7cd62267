use std::mem;
use std::sync::Arc;

use rmevents_config::shared::{SourceConfig, StreamingConfig, WatchedTable};
use tracing::{error, info, warn};

use crate::accumulator::MessageAccumulator;
use crate::bail;
use crate::concurrency::dataflow::DataflowController;
use crate::concurrency::signal::{RunSignal, ShutdownTrigger};
use crate::error::{ErrorKind, StreamError, StreamResult};
use crate::message::{MessageArena, MessageKind};
use crate::metrics::register_metrics;
use crate::pool::{delivery_channel, return_channels};
use crate::schema::WatchTable;
use crate::sink::EventSink;
use crate::source::ChangeSource;
use crate::stats::{HandlerStats, ListenerStats, SystemStats};
use crate::workers::base::{ThreadHandle, Worker, WorkerHandle};
use crate::workers::handler::{HandlerOutcome, HandlerWorker};
use crate::workers::listener::{ListenerWorker, TableWatcher};

/// Pool index of the listener, the only allocating thread.
const LISTENER_POOL_ORIGIN: u16 = 0;

#[derive(Debug)]
enum SystemState {
    NotStarted,
    Started {
        listener: ThreadHandle<()>,
        handlers: Vec<ThreadHandle<HandlerOutcome>>,
        arena: Arc<MessageArena>,
    },
    Stopped,
}

/// Owns every thread of the streaming core and wires them together.
///
/// A system runs once: after [`StreamingSystem::wait`] returns it cannot be started again.
pub struct StreamingSystem<S> {
    config: Arc<StreamingConfig>,
    sink: S,
    sources: Vec<(WatchedTable, Box<dyn ChangeSource>)>,
    state: SystemState,
    shutdown: Option<ShutdownTrigger>,
    listener_stats: ListenerStats,
    handler_stats: Vec<HandlerStats>,
    discarded_fragments: u64,
}

impl<S> StreamingSystem<S>
where
    S: EventSink + Clone + Send + 'static,
{
    /// Creates a system whose handlers each get a clone of `sink`.
    pub fn new(config: Arc<StreamingConfig>, sink: S) -> Self {
        Self {
            config,
            sink,
            sources: Vec::new(),
            state: SystemState::NotStarted,
            shutdown: None,
            listener_stats: ListenerStats::default(),
            handler_stats: Vec::new(),
            discarded_fragments: 0,
        }
    }

    /// Registers the change source for `table`. Every table needs one before starting.
    pub fn add_source<C>(&mut self, table: WatchedTable, source: C) -> StreamResult<()>
    where
        C: ChangeSource + 'static,
    {
        if !matches!(self.state, SystemState::NotStarted) {
            bail!(
                ErrorKind::InvalidState,
                "Sources can only be added before the system starts",
                table.as_str()
            );
        }

        if self.sources.iter().any(|(existing, _)| *existing == table) {
            bail!(
                ErrorKind::ConfigError,
                "A change source is already registered for this table",
                table.as_str()
            );
        }

        self.sources.push((table, Box::new(source)));

        Ok(())
    }

    pub fn start(&mut self) -> StreamResult<()> {
        if !matches!(self.state, SystemState::NotStarted) {
            bail!(
                ErrorKind::InvalidState,
                "Streaming system can only be started once"
            );
        }

        self.config.validate()?;
        if let Some(table) = WatchedTable::ALL
            .into_iter()
            .find(|table| !self.sources.iter().any(|(existing, _)| existing == table))
        {
            bail!(
                ErrorKind::ConfigError,
                "No change source registered for a watched table",
                table.as_str()
            );
        }

        let handlers = self.config.handlers.count;
        info!(
            handlers,
            pool_capacity = self.config.pool.capacity,
            accumulator_size_bits = self.config.handlers.accumulator_size_bits,
            "starting streaming system"
        );

        register_metrics();

        // From here on a failure leaves the system unusable.
        self.state = SystemState::Stopped;

        let arena = Arc::new(MessageArena::with_capacity(self.config.pool.capacity));
        let (pool, remotes) = return_channels(&arena, LISTENER_POOL_ORIGIN, handlers)?;

        let mut outbound = Vec::with_capacity(handlers);
        let mut inbound = Vec::with_capacity(handlers);
        for _ in 0..handlers {
            let (tail, head) = delivery_channel(&arena, LISTENER_POOL_ORIGIN)?;
            outbound.push(tail);
            inbound.push(head);
        }

        let controllers = (0..handlers)
            .map(|_| Arc::new(DataflowController::new()))
            .collect::<Vec<_>>();
        let trigger = ShutdownTrigger::new(RunSignal::new(), controllers.clone().into());
        self.shutdown = Some(trigger.clone());
        self.handler_stats = (0..handlers).map(|_| HandlerStats::default()).collect();

        // Handlers go first so no fragment is ever sent to a thread that does not exist yet.
        let mut handler_handles = Vec::with_capacity(handlers);
        let workers = inbound.into_iter().zip(remotes).zip(controllers);
        for (id, ((head, remote), controller)) in workers.enumerate() {
            let worker = HandlerWorker::new(
                id as u16,
                vec![head],
                remote,
                MessageAccumulator::new(self.config.handlers.accumulator_size_bits, handlers),
                controller,
                Arc::clone(&arena),
                self.sink.clone(),
                trigger.clone(),
                self.handler_stats[id].clone(),
            );

            match worker.start() {
                Ok(handle) => handler_handles.push(handle),
                Err(err) => {
                    Self::abort_start(&trigger, handler_handles);
                    return Err(err);
                }
            }
        }

        let mut watchers = Vec::with_capacity(WatchedTable::ALL.len());
        for (table, source) in mem::take(&mut self.sources) {
            let poll_timeout = self
                .config
                .source(table)
                .map(SourceConfig::poll_timeout)
                .unwrap_or_else(|| SourceConfig::new(table).poll_timeout());
            let descriptor = WatchTable::for_kind(MessageKind::from(table));
            watchers.push(TableWatcher::new(descriptor, source, poll_timeout));
        }
        watchers.sort_by_key(|watcher| watcher.table().kind);

        let listener = ListenerWorker::new(
            watchers,
            Arc::clone(&arena),
            pool,
            outbound,
            self.config.listener.max_events_per_poll,
            trigger.clone(),
            self.listener_stats.clone(),
        );
        let listener = match listener.start() {
            Ok(listener) => listener,
            Err(err) => {
                Self::abort_start(&trigger, handler_handles);
                return Err(err);
            }
        };

        self.state = SystemState::Started {
            listener,
            handlers: handler_handles,
            arena,
        };

        info!("streaming system started");

        Ok(())
    }

    /// Returns a trigger that stops the system from any thread.
    ///
    /// [`None`] until the system was started.
    pub fn shutdown_trigger(&self) -> Option<ShutdownTrigger> {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        info!("trying to shut down the streaming system");

        let Some(trigger) = &self.shutdown else {
            info!("streaming system was not started, nothing to shut down");
            return;
        };

        if trigger.trigger() {
            info!("shut down signal sent to all workers");
        }
    }

    /// Waits for every thread to exit, listener first, and returns their aggregated errors.
    ///
    /// Threads only exit after a shutdown, requested either through
    /// [`StreamingSystem::shutdown`] or by a worker that failed.
    pub fn wait(&mut self) -> StreamResult<()> {
        let SystemState::Started {
            listener,
            handlers,
            arena,
        } = mem::replace(&mut self.state, SystemState::Stopped)
        else {
            info!("streaming system was not started, nothing to wait for");

            return Ok(());
        };

        let mut errors: Vec<StreamError> = vec![];

        info!("waiting for listener to complete");

        // The listener is joined first so nothing is still being sent when the handlers'
        // queues are drained below.
        if let Err(err) = listener.wait() {
            error!(error = %err, "listener completed with an error");
            errors.push(err);
        }

        info!("waiting for handlers to complete");

        let mut discarded = 0;
        let mut pending_buckets = 0;
        for handler in handlers {
            let worker_type = handler.worker_type();
            // A failed handler still hands back its queues, so they are drained either way.
            let result = handler.wait().and_then(|mut outcome| {
                for queue in &mut outcome.inbound {
                    discarded += queue.flush().0;
                }
                pending_buckets += outcome.pending_buckets;

                outcome.result
            });

            if let Err(err) = result {
                error!(
                    worker = %worker_type,
                    error = %err,
                    "handler completed with an error"
                );
                errors.push(err);
            }
        }

        self.discarded_fragments = discarded as u64;
        if discarded > 0 || pending_buckets > 0 {
            warn!(
                discarded,
                pending_buckets, "streaming system stopped with undelivered fragments"
            );
        }

        let stats = self.stats();
        info!(
            fragments_received = stats.fragments_received,
            events_dispatched = stats.events_dispatched,
            messages_allocated = arena.allocated(),
            "streaming system stopped"
        );

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }

    pub fn shutdown_and_wait(&mut self) -> StreamResult<()> {
        self.shutdown();
        self.wait()
    }

    /// Returns a snapshot of the system counters. Readable at any time.
    ///
    /// Fragments discarded from the handlers' queues are only counted once
    /// [`StreamingSystem::wait`] has returned.
    pub fn stats(&self) -> SystemStats {
        SystemStats {
            fragments_discarded: self.discarded_fragments,
            ..SystemStats::collect(&self.listener_stats, &self.handler_stats)
        }
    }

    fn abort_start(trigger: &ShutdownTrigger, handlers: Vec<ThreadHandle<HandlerOutcome>>) {
        trigger.trigger();
        for handler in handlers {
            let result = handler.wait().and_then(|outcome| outcome.result);
            if let Err(err) = result {
                warn!(error = %err, "handler failed while aborting start");
            }
        }
    }
}

impl<S> Drop for StreamingSystem<S> {
    fn drop(&mut self) {
        if let (SystemState::Started { .. }, Some(trigger)) = (&self.state, &self.shutdown) {
            trigger.trigger();
        }
    }
}
