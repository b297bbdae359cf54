use anyhow::{Context, anyhow};
use roster::auth::JwtTokenVerifier;
use roster::store::create_pg_pool;
use roster_api::config::ApiConfig;
use roster_api::startup::Application;
use roster_config::load_config;
use roster_config::shared::{PgConnectionConfig, ROSTER_API_OPTIONS, StorageConfig};
use roster_telemetry::tracing::init_tracing;
use std::env;
use tracing::{error, info};

/// Role given to tokens issued without an explicit one.
const DEFAULT_TOKEN_ROLE: &str = "admin";

fn main() -> anyhow::Result<()> {
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    actix_web::rt::System::new().block_on(async_main())?;

    Ok(())
}

/// Runs the server without arguments, otherwise the named command.
async fn async_main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] => {
            let config = load_config::<ApiConfig>()
                .context("loading API configuration for server startup")?;
            log_config(&config);
            let application = Application::build(config).await?;
            application.run_until_stopped().await?;
        }
        ["migrate"] => {
            let config = load_config::<ApiConfig>()
                .context("loading API configuration for migrations")?;
            let StorageConfig::Postgres { connection } = &config.storage else {
                error!("migrations require postgres storage");
                return Err(anyhow!("storage is not postgres, nothing to migrate"));
            };
            log_pg_connection_config(connection);

            let pool = create_pg_pool(connection, &ROSTER_API_OPTIONS, 1);
            roster_postgres::migrate(&pool)
                .await
                .context("applying database migrations")?;
            info!("database migrated successfully");
        }
        ["issue-token", username] | ["issue-token", username, _] => {
            let role = args.get(2).copied().unwrap_or(DEFAULT_TOKEN_ROLE);
            let config = load_config::<ApiConfig>()
                .context("loading API configuration for token issuing")?;
            config.auth.validate()?;

            let token = JwtTokenVerifier::new(&config.auth).issue(username, username, role)?;
            println!("{token}");
        }
        [command, ..] => {
            error!(%command, "invalid command");
            return Err(anyhow!(
                "invalid command: {command}, expected `migrate` or `issue-token <username> [role]`"
            ));
        }
    }

    Ok(())
}

fn log_config(config: &ApiConfig) {
    info!(
        host = config.application.host,
        port = config.application.port,
        push_port = config.push.port,
        push_path = config.push.path,
        concurrency = config.queue.concurrency,
        max_retries = config.queue.max_retries,
        batch_size = config.ingestion.batch_size,
        "api options"
    );

    match &config.storage {
        StorageConfig::Memory => info!("using in-memory storage"),
        StorageConfig::Postgres { connection } => log_pg_connection_config(connection),
    }
}

fn log_pg_connection_config(config: &PgConnectionConfig) {
    info!(
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "pg database options",
    );
}
