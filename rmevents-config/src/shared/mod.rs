//! Startup configuration shared by every component of the streaming core.

mod base;
mod handler;
mod listener;
mod pool;
mod source;
mod streaming;

pub use base::ValidationError;
pub use handler::HandlerConfig;
pub use listener::ListenerConfig;
pub use pool::PoolConfig;
pub use source::{SourceConfig, WatchedTable};
pub use streaming::StreamingConfig;
