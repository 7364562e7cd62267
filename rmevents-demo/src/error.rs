use metrics_exporter_prometheus::BuildError;
use rmevents::error::StreamError;
use rmevents_config::LoadConfigError;
use rmevents_config::shared::ValidationError;
use rmevents_telemetry::tracing::TracingError;
use thiserror::Error;

pub type DemoResult<T> = Result<T, DemoError>;

/// Everything that can stop the demo.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("streaming failed: {0}")]
    Stream(#[from] StreamError),

    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to initialize tracing: {0}")]
    Tracing(#[from] TracingError),

    #[error("failed to initialize metrics: {0}")]
    Metrics(#[from] BuildError),
}
