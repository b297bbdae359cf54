use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Command queue and mutation worker pool settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Number of mutation workers draining the queue concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: u16,
    /// How many times a failed command is handed back to the queue before it is discarded.
    ///
    /// Zero means a failed command is logged and dropped on its first failure.
    #[serde(default)]
    pub max_retries: u32,
    /// Upper bound, in milliseconds, an idle worker waits before polling the queue again.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Seconds after which a claimed but unacknowledged command becomes deliverable again.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,
}

impl QueueConfig {
    pub const DEFAULT_CONCURRENCY: u16 = 5;

    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

    pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 300;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::invalid(
                "queue.concurrency",
                "must be greater than 0",
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(ValidationError::invalid(
                "queue.poll_interval_ms",
                "must be greater than 0",
            ));
        }

        if self.visibility_timeout_secs == 0 {
            return Err(ValidationError::invalid(
                "queue.visibility_timeout_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: 0,
            poll_interval_ms: default_poll_interval_ms(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
        }
    }
}

fn default_concurrency() -> u16 {
    QueueConfig::DEFAULT_CONCURRENCY
}

fn default_poll_interval_ms() -> u64 {
    QueueConfig::DEFAULT_POLL_INTERVAL_MS
}

fn default_visibility_timeout_secs() -> u64 {
    QueueConfig::DEFAULT_VISIBILITY_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_discard_failed_commands() {
        let config: QueueConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.concurrency, 5);
        assert_eq!(config.max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = QueueConfig {
            concurrency: 0,
            ..QueueConfig::default()
        };

        assert!(config.validate().is_err());
    }
}
