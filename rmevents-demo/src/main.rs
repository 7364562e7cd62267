//! Streams synthetic cluster events through the streaming core.
//!
//! Loads the streaming configuration, initializes telemetry, feeds generated row changes
//! into in-memory sources and waits until every event was joined and delivered.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use rmevents::StreamingSystem;
use rmevents::source::MemorySource;
use rmevents_config::load_config;
use rmevents_config::shared::{StreamingConfig, WatchedTable};
use rmevents_telemetry::metrics::{init_metrics, init_metrics_handle};
use rmevents_telemetry::tracing::init_tracing;
use tracing::{info, warn};

use crate::error::DemoResult;
use crate::generator::EventGenerator;
use crate::sink::LogSink;

mod error;
mod generator;
mod sink;

/// Events sent ahead of the slowest handler. Bounds the messages in flight below the pool
/// capacity.
const MAX_EVENTS_IN_FLIGHT: u64 = 512;

/// How long to wait for the remaining events once everything was sent.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of events to generate.
    #[arg(long, default_value_t = 10_000)]
    events: u64,

    /// Largest number of container fragments per event.
    #[arg(long, default_value_t = 4)]
    max_fan_out: u32,

    /// Seed of the event generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Serve Prometheus metrics on this port instead of printing them on exit.
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Log every completed event as JSON.
    #[arg(long)]
    log_events: bool,
}

fn main() -> DemoResult<()> {
    let args = Args::parse();

    let config = load_config::<StreamingConfig>()?;
    config.validate()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    let metrics_handle = match args.metrics_port {
        Some(port) => {
            init_metrics(port, Some(env!("CARGO_BIN_NAME")))?;
            None
        }
        None => Some(init_metrics_handle()?),
    };

    let sink = LogSink::new(args.log_events);
    let mut system = StreamingSystem::new(Arc::new(config), sink.clone());

    let mut senders = Vec::with_capacity(WatchedTable::ALL.len());
    for table in WatchedTable::ALL {
        let (sender, source) = MemorySource::channel();
        system.add_source(table, source)?;
        senders.push((table, sender));
    }

    system.start()?;

    let started = Instant::now();
    let mut generator = EventGenerator::new(args.seed, args.max_fan_out);
    for sent in 0..args.events {
        while sent.saturating_sub(sink.delivered()) >= MAX_EVENTS_IN_FLIGHT {
            thread::sleep(Duration::from_micros(100));
        }
        generator.send_event(&senders)?;
    }

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while sink.delivered() < args.events && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    if sink.delivered() < args.events {
        warn!(
            delivered = sink.delivered(),
            expected = args.events,
            "not every event completed before the drain timeout"
        );
    }

    system.shutdown_and_wait()?;

    let stats = system.stats();
    info!(
        events = stats.events_dispatched,
        fragments = stats.fragments_received,
        dropped = stats.fragments_dropped,
        discarded = stats.fragments_discarded,
        allocated = stats.messages_allocated,
        recycled = stats.messages_recycled,
        wakeups = stats.wakeups_delivered,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "demo finished"
    );

    if let Some(handle) = metrics_handle {
        println!("{}", handle.render());
    }

    Ok(())
}
