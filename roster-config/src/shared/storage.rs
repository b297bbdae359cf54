use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Backend holding staff records, notifications and queued commands.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process-local storage. Nothing survives a restart.
    Memory,
    /// Durable storage in Postgres.
    Postgres { connection: PgConnectionConfig },
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            StorageConfig::Memory => Ok(()),
            StorageConfig::Postgres { connection } => connection.validate(),
        }
    }
}
