use std::sync::Arc;
use std::time::Duration;

use metrics::{Counter, counter};
use tracing::{error, info, warn};

use crate::concurrency::dataflow::{DataflowController, WakeOutcome};
use crate::concurrency::queue::QueueTail;
use crate::concurrency::signal::ShutdownTrigger;
use crate::error::StreamResult;
use crate::failpoints::{LISTENER_BUILD_FRAGMENT, stream_fail_point};
use crate::message::MessageArena;
use crate::metrics::{
    HANDLER_ID_LABEL, REASON_LABEL, RMEVENTS_FRAGMENTS_DROPPED_TOTAL,
    RMEVENTS_FRAGMENTS_RECEIVED_TOTAL, RMEVENTS_WAKEUPS_DELIVERED_TOTAL, TABLE_LABEL,
};
use crate::pool::AllocSide;
use crate::schema::WatchTable;
use crate::source::{ChangeSource, RowChange};
use crate::stats::ListenerStats;
use crate::workers::base::{ThreadHandle, Worker, WorkerType};
use crate::workers::router::HandlerRouter;

/// One watched table and the source its changes come from.
pub struct TableWatcher {
    table: &'static WatchTable,
    source: Box<dyn ChangeSource>,
    poll_timeout: Duration,
    received: Counter,
}

impl TableWatcher {
    pub fn new(
        table: &'static WatchTable,
        source: Box<dyn ChangeSource>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            table,
            source,
            poll_timeout,
            received: counter!(RMEVENTS_FRAGMENTS_RECEIVED_TOTAL, TABLE_LABEL => table.name),
        }
    }

    pub fn table(&self) -> &'static WatchTable {
        self.table
    }

    fn poll(
        &mut self,
        timeout: Duration,
        max_events: usize,
        dispatch: &mut FragmentDispatch,
    ) -> StreamResult<usize> {
        let table = self.table;
        let received = self
            .source
            .poll(timeout, max_events, &mut |row: &RowChange<'_>| {
                dispatch.on_row(table, row)
            })?;
        self.received.increment(received as u64);

        Ok(received)
    }
}

/// Everything the listener needs to turn a row change into a routed fragment.
struct FragmentDispatch {
    arena: Arc<MessageArena>,
    pool: AllocSide,
    outbound: Vec<QueueTail>,
    controllers: Vec<Arc<DataflowController>>,
    wakeups: Vec<Counter>,
    router: HandlerRouter,
    stats: ListenerStats,
}

impl FragmentDispatch {
    fn on_row(&mut self, table: &'static WatchTable, row: &RowChange<'_>) {
        self.stats.fragment_received();

        if let Err(err) = self.build_and_send(table, row) {
            debug_assert!(err.kind().drops_fragment(), "unexpected error: {err}");
            warn!(table = table.name, error = %err, "dropping row change");

            self.stats.fragment_dropped();
            counter!(
                RMEVENTS_FRAGMENTS_DROPPED_TOTAL,
                TABLE_LABEL => table.name,
                REASON_LABEL => err.kind().as_label()
            )
            .increment(1);
        }
    }

    fn build_and_send(
        &mut self,
        table: &'static WatchTable,
        row: &RowChange<'_>,
    ) -> StreamResult<()> {
        stream_fail_point(LISTENER_BUILD_FRAGMENT)?;

        let mut handle = self.pool.get_message()?;
        let correlation_id = match table.populate(row, self.arena.message_mut(&mut handle)) {
            Ok(correlation_id) => correlation_id,
            Err(err) => {
                self.pool.put_back(handle);
                return Err(err);
            }
        };

        let handler = self.router.route(correlation_id);
        self.outbound[handler].enqueue(handle);

        Ok(())
    }

    /// Signals handlers that prepared to block, without waiting on busy controllers.
    fn wake_handlers(&self) {
        for (controller, wakeups) in self.controllers.iter().zip(&self.wakeups) {
            if controller.check_consumer() == WakeOutcome::Delivered {
                self.stats.wakeup_delivered();
                wakeups.increment(1);
            }
        }
    }

    /// Makes sure no handler is left blocked on data this thread already sent.
    fn wake_handlers_sync(&self) {
        for (controller, wakeups) in self.controllers.iter().zip(&self.wakeups) {
            if controller.check_consumer_sync() == WakeOutcome::Delivered {
                self.stats.wakeup_delivered();
                wakeups.increment(1);
            }
        }
    }

    fn publish_pool_stats(&self) {
        let stats = self.pool.stats();
        self.stats.set_pool_totals(stats.fresh, stats.recycled);
    }
}

/// The single thread that polls every watched table and feeds the handlers.
///
/// Each iteration polls every source without blocking. When nothing arrived, the listener
/// makes sure every handler has seen what was already sent and then blocks on the source
/// with the shortest poll timeout, so no other source waits longer than that timeout.
pub struct ListenerWorker {
    watchers: Vec<TableWatcher>,
    dispatch: FragmentDispatch,
    max_events: usize,
    blocking_watcher: usize,
    shutdown: ShutdownTrigger,
}

impl ListenerWorker {
    pub fn new(
        watchers: Vec<TableWatcher>,
        arena: Arc<MessageArena>,
        pool: AllocSide,
        outbound: Vec<QueueTail>,
        max_events: usize,
        shutdown: ShutdownTrigger,
        stats: ListenerStats,
    ) -> Self {
        let controllers = shutdown.controllers().to_vec();
        debug_assert_eq!(controllers.len(), outbound.len());

        let wakeups = (0..controllers.len())
            .map(|id| {
                counter!(RMEVENTS_WAKEUPS_DELIVERED_TOTAL, HANDLER_ID_LABEL => id.to_string())
            })
            .collect();

        let blocking_watcher = blocking_watcher(&watchers);

        Self {
            watchers,
            dispatch: FragmentDispatch {
                arena,
                pool,
                router: HandlerRouter::new(outbound.len()),
                outbound,
                controllers,
                wakeups,
                stats,
            },
            max_events: max_events.max(1),
            blocking_watcher,
            shutdown,
        }
    }

    fn run(mut self) -> StreamResult<()> {
        let _panic_guard = self.shutdown.guard_panics();

        info!(
            tables = self.watchers.len(),
            handlers = self.dispatch.outbound.len(),
            "listener started"
        );

        let result = self.run_loop();
        if let Err(err) = &result {
            error!(error = %err, "listener failed, shutting down the system");
            self.shutdown.trigger();
        }

        for watcher in &mut self.watchers {
            if let Err(err) = watcher.source.shutdown() {
                warn!(
                    table = watcher.table.name,
                    error = %err,
                    "failed to shut down change source"
                );
            }
        }
        self.dispatch.publish_pool_stats();

        info!("listener stopped");

        result
    }

    fn run_loop(&mut self) -> StreamResult<()> {
        if self.watchers.is_empty() {
            return Ok(());
        }

        while self.shutdown.is_running() {
            let mut found = 0;
            for watcher in &mut self.watchers {
                found += watcher.poll(Duration::ZERO, self.max_events, &mut self.dispatch)?;
            }
            self.dispatch.publish_pool_stats();

            if found > 0 {
                self.dispatch.wake_handlers();
                continue;
            }

            self.dispatch.wake_handlers_sync();

            let watcher = &mut self.watchers[self.blocking_watcher];
            let timeout = watcher.poll_timeout;
            if watcher.poll(timeout, self.max_events, &mut self.dispatch)? > 0 {
                self.dispatch.wake_handlers();
            }
        }

        Ok(())
    }
}

/// Index of the watcher with the shortest poll timeout. Ties go to the first one.
fn blocking_watcher(watchers: &[TableWatcher]) -> usize {
    watchers
        .iter()
        .enumerate()
        .min_by_key(|(_, watcher)| watcher.poll_timeout)
        .map(|(index, _)| index)
        .unwrap_or(0)
}

impl Worker for ListenerWorker {
    type Handle = ThreadHandle<()>;

    fn start(self) -> StreamResult<Self::Handle> {
        ThreadHandle::spawn(WorkerType::Listener, move || self.run())
    }
}
