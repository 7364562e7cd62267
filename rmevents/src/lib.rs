//! Concurrent core of a change-data-capture event aggregator.
//!
//! Row changes of five watched tables arrive as fragments sharing a correlation id. A single
//! listener thread turns them into pooled message objects and routes them by correlation id
//! to handler threads, which join the fragments of each event and hand completed events to a
//! sink. Messages travel over lock-free single-producer queues and are recycled back to the
//! listener's pool once both the queue and the handler are done with them.

pub mod accumulator;
pub mod concurrency;
pub mod error;
pub mod failpoints;
mod macros;
pub mod message;
pub mod metrics;
pub mod pool;
pub mod schema;
pub mod sink;
pub mod source;
pub mod stats;
pub mod system;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;

pub use system::StreamingSystem;
