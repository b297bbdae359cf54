mod auth;
mod base;
mod connection;
mod ingestion;
mod push;
mod queue;
mod storage;

pub use auth::{AdminSeedConfig, AuthConfig};
pub use base::ValidationError;
pub use connection::{
    IntoConnectOptions, PgConnectionConfig, PgConnectionOptions, ROSTER_API_OPTIONS,
    ROSTER_QUEUE_OPTIONS, TlsConfig,
};
pub use ingestion::IngestionConfig;
pub use push::PushConfig;
pub use queue::QueueConfig;
pub use storage::StorageConfig;
