use std::time::Duration;
use std::{fmt, sync::Arc};

use tokio::sync::Notify;
use tokio::time::timeout;

/// Default timeout for waits in tests.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// An [`Arc<Notify>`] whose waits panic after a timeout.
#[derive(Clone)]
pub struct TimedNotify {
    notify: Arc<Notify>,
    timeout_duration: Duration,
}

impl TimedNotify {
    pub fn new(notify: Arc<Notify>) -> Self {
        Self::with_timeout(notify, DEFAULT_NOTIFY_TIMEOUT)
    }

    pub fn with_timeout(notify: Arc<Notify>, timeout_duration: Duration) -> Self {
        Self {
            notify,
            timeout_duration,
        }
    }

    /// Waits for the notification.
    ///
    /// # Panics
    ///
    /// Panics if the timeout elapses first.
    pub async fn notified(&self) {
        if timeout(self.timeout_duration, self.notify.notified())
            .await
            .is_err()
        {
            panic!(
                "test notification timed out after {:?}, the expected state was never reached",
                self.timeout_duration
            );
        }
    }
}

impl fmt::Debug for TimedNotify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedNotify")
            .field("timeout_duration", &self.timeout_duration)
            .finish()
    }
}

/// Polls `condition` every few milliseconds until it holds.
///
/// # Panics
///
/// Panics if the condition does not hold within [`DEFAULT_NOTIFY_TIMEOUT`].
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let polled = timeout(DEFAULT_NOTIFY_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    if polled.is_err() {
        panic!("condition not reached after {DEFAULT_NOTIFY_TIMEOUT:?}");
    }
}
