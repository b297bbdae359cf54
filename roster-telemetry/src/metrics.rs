use std::sync::Mutex;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// Interval between upkeep runs of the Prometheus recorder.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// The recorder is global and can only be installed once, while tests build many
// applications in one process. A mutex rather than a `OnceLock` because installing is fallible.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the Prometheus recorder on first use and returns a handle for rendering.
///
/// The caller exposes the handle on its own HTTP endpoint. Must be called inside a tokio
/// runtime since the first call spawns the upkeep task.
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
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(UPKEEP_INTERVAL).await;
            trace!("running metrics upkeep");
            upkeep_handle.run_upkeep();
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_initialization_reuses_the_recorder() {
        let first = init_metrics_handle().unwrap();
        let second = init_metrics_handle().unwrap();

        assert_eq!(first.render(), second.render());
    }
}
