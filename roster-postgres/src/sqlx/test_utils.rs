use roster_config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::{Connection, Executor, PgConnection, PgPool};

/// Creates the configured database, applies migrations and returns a pool connected to it.
///
/// # Panics
/// Panics if the server is unreachable or any statement fails.
pub async fn create_pg_database(config: &PgConnectionConfig) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db(None))
        .await
        .expect("failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("failed to create database");

    let pool = PgPool::connect_with(config.with_db(None))
        .await
        .expect("failed to connect to the test database");
    crate::migrate(&pool)
        .await
        .expect("failed to migrate the test database");

    pool
}

/// Terminates open sessions on the configured database and drops it.
///
/// Failures are printed and swallowed so cleanup never fails a test.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let mut connection = match PgConnection::connect_with(&config.without_db(None)).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {err}");
            return;
        }
    };

    if let Err(err) = connection
        .execute(&*format!(
            r#"
            select pg_terminate_backend(pid)
            from pg_stat_activity
            where datname = '{}' and pid <> pg_backend_pid();"#,
            config.name
        ))
        .await
    {
        eprintln!(
            "warning: failed to terminate sessions on {}: {err}",
            config.name
        );
    }

    if let Err(err) = connection
        .execute(&*format!(r#"drop database if exists "{}";"#, config.name))
        .await
    {
        eprintln!("warning: failed to drop database {}: {err}", config.name);
    }
}
