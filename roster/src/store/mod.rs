//! Persistent store adapters for staff records, notifications and admin accounts.
//!
//! Each store is a trait with an in-memory implementation, used for development and tests, and
//! a Postgres implementation backed by the `roster` schema.

use std::time::Duration;

use roster_config::shared::{IntoConnectOptions, PgConnectionConfig, PgConnectionOptions};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod admin;
pub mod notification;
pub mod staff;

/// Duration after which idle connections are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates a lazily connected pool for the roster database.
///
/// No connection is opened until the first query runs.
pub fn create_pg_pool(
    config: &PgConnectionConfig,
    options: &PgConnectionOptions,
    max_connections: u32,
) -> PgPool {
    PgPoolOptions::new()
        .min_connections(0)
        .max_connections(max_connections)
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connect_lazy_with(config.with_db(Some(options)))
}
