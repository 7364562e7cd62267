//! Prometheus recorder setup.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// Port the standalone exporter listens on.
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Interval between histogram upkeep runs for handle-based recorders.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// The recorder is global and can be installed only once, while tests ask for a handle many
// times. Initialization is fallible, so a mutex-guarded option is used instead of a once cell.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the recorder without an HTTP listener and returns a handle for rendering.
///
/// The first call installs the recorder and starts an upkeep thread. Later calls return
/// clones of the cached handle.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    let mut cached = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(handle) = cached.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *cached = Some(handle.clone());

    let upkeep_handle = handle.clone();
    let spawned = thread::Builder::new()
        .name("metrics-upkeep".to_string())
        .spawn(move || {
            loop {
                thread::sleep(UPKEEP_INTERVAL);
                trace!("running metrics upkeep");
                upkeep_handle.run_upkeep();
            }
        });
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "failed to spawn metrics upkeep thread");
    }

    Ok(handle)
}

/// Installs the recorder with an HTTP listener serving `/metrics` on `[::]:port`.
pub fn init_metrics(port: u16, service_name: Option<&str>) -> Result<(), BuildError> {
    let mut builder = PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port));

    if let Some(service_name) = service_name {
        builder = builder.add_global_label("service", service_name);
    }

    builder.install()?;

    Ok(())
}
