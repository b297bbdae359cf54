use std::sync::Once;

use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Environment variable that turns on log output in tests.
const ENABLE_TEST_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Keeps the background log writer alive.
///
/// Buffered log lines are flushed when this value is dropped, so binaries hold it until exit.
#[must_use = "dropping the flusher stops log output"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for a binary.
///
/// Logs go to stdout through a non-blocking writer and are filtered by `RUST_LOG`.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_target(true))
        .try_init()?;

    info!(app = app_name, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TEST_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
