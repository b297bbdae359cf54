use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Websocket push server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PushConfig {
    pub host: String,
    pub port: u16,
    /// Request path subscribers connect to.
    #[serde(default = "default_path")]
    pub path: String,
    /// Frames buffered per subscriber before further frames are dropped for it.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl PushConfig {
    pub const DEFAULT_PATH: &'static str = "/ws/notifications";

    pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.path.starts_with('/') {
            return Err(ValidationError::invalid("push.path", "must start with `/`"));
        }

        if self.subscriber_buffer == 0 {
            return Err(ValidationError::invalid(
                "push.subscriber_buffer",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn default_path() -> String {
    PushConfig::DEFAULT_PATH.to_string()
}

fn default_subscriber_buffer() -> usize {
    PushConfig::DEFAULT_SUBSCRIBER_BUFFER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_is_rejected() {
        let config = PushConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            path: "ws".to_string(),
            subscriber_buffer: 8,
        };

        assert!(config.validate().is_err());
    }
}
