//! Schema migrations and query helpers for the roster database.

use ::sqlx::PgPool;
use ::sqlx::migrate::{MigrateError, Migrator};

pub mod admins;
pub mod notifications;
pub mod queue;
pub mod staff;
#[cfg(feature = "test-utils")]
pub mod sqlx;

static MIGRATOR: Migrator = ::sqlx::migrate!("./migrations");

/// Applies every pending migration under `migrations/`.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
