use roster_config::Config;
use roster_config::shared::{
    AuthConfig, IngestionConfig, PushConfig, QueueConfig, StorageConfig, ValidationError,
};
use serde::Deserialize;
use std::fmt;

/// Complete configuration of the roster API service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// HTTP server settings.
    pub application: ApplicationSettings,
    /// Backend for staff records, notifications and the command queue.
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    pub auth: AuthConfig,
    /// Websocket listener serving notification subscribers.
    pub push: PushConfig,
}

impl ApiConfig {
    /// Checks every section, stopping at the first invalid one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.storage.validate()?;
        self.queue.validate()?;
        self.ingestion.validate()?;
        self.auth.validate()?;
        self.push.validate()?;

        Ok(())
    }
}

impl Config for ApiConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    /// Host address the API listens on.
    pub host: String,
    /// Port number the API listens on.
    pub port: u16,
}

impl fmt::Display for ApplicationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    host: {}", self.host)?;
        writeln!(f, "    port: {}", self.port)
    }
}
