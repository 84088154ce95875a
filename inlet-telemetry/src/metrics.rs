use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// Port the standalone metrics endpoint listens on.
const METRICS_PORT: u16 = 9000;

/// Interval between recorder upkeep runs.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// Global cache for the Prometheus handle.
//
// [`PrometheusBuilder::install_recorder`] installs a process-wide recorder and
// fails on any later call, but tests initialize metrics repeatedly. A [`Mutex`]
// over an [`Option`] is used instead of `OnceLock` because initialization is
// fallible.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the Prometheus recorder and returns a handle for rendering.
///
/// Use this when the metrics endpoint is served by an existing HTTP framework:
/// the caller renders [`PrometheusHandle::render`] at a path of its choosing.
/// Initialization happens once per process; later calls return cloned handles.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE.lock().unwrap();

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *prometheus_handle = Some(handle.clone());

    spawn_upkeep(handle.clone());

    Ok(handle)
}

/// Installs the Prometheus recorder together with a scrape endpoint.
///
/// Starts an HTTP listener on `[::]:9000` serving `/metrics`, for standalone
/// deployments without an existing HTTP surface. Must be called from within a
/// tokio runtime.
pub fn init_metrics() -> Result<(), BuildError> {
    let address = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), METRICS_PORT);

    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
}

/// Periodically compacts recorder state to avoid unbounded memory growth.
fn spawn_upkeep(handle: PrometheusHandle) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(UPKEEP_INTERVAL).await;
            trace!("running metrics upkeep");
            handle.run_upkeep();
        }
    });
}
