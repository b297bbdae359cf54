use std::sync::LazyLock;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::Config;
use crate::shared::ValidationError;

const COMMON_TIMEZONE: &str = "UTC";
const COMMON_CLIENT_ENCODING: &str = "UTF8";

/// Session settings for connections serving HTTP requests.
pub static ROSTER_API_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        timezone: COMMON_TIMEZONE.to_string(),
        client_encoding: COMMON_CLIENT_ENCODING.to_string(),
        statement_timeout: 30_000,
        lock_timeout: 5_000,
        idle_in_transaction_session_timeout: 60_000,
        application_name: "roster_api".to_string(),
    });

/// Session settings for connections used by the command queue and mutation workers.
///
/// Lock timeouts are short because dequeue relies on `skip locked` and should never wait.
pub static ROSTER_QUEUE_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        timezone: COMMON_TIMEZONE.to_string(),
        client_encoding: COMMON_CLIENT_ENCODING.to_string(),
        statement_timeout: 10_000,
        lock_timeout: 2_000,
        idle_in_transaction_session_timeout: 30_000,
        application_name: "roster_queue".to_string(),
    });

/// Postgres runtime parameters applied to each new session.
#[derive(Debug, Clone)]
pub struct PgConnectionOptions {
    pub timezone: String,
    pub client_encoding: String,
    pub statement_timeout: u32,
    pub lock_timeout: u32,
    pub idle_in_transaction_session_timeout: u32,
    pub application_name: String,
}

impl PgConnectionOptions {
    pub fn to_key_value_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("timezone".to_string(), self.timezone.clone()),
            ("client_encoding".to_string(), self.client_encoding.clone()),
            (
                "statement_timeout".to_string(),
                self.statement_timeout.to_string(),
            ),
            ("lock_timeout".to_string(), self.lock_timeout.to_string()),
            (
                "idle_in_transaction_session_timeout".to_string(),
                self.idle_in_transaction_session_timeout.to_string(),
            ),
            (
                "application_name".to_string(),
                self.application_name.clone(),
            ),
        ]
    }
}

/// Connection settings for the roster database.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
}

impl PgConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tls.enabled && self.tls.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

impl Config for PgConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: String::new(),
            enabled: false,
        }
    }
}

/// Conversion of a connection config into driver connect options.
pub trait IntoConnectOptions<Output> {
    /// Options targeting the server's default database, used to create or drop databases.
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> Output;
    /// Options targeting the configured database.
    fn with_db(&self, options: Option<&PgConnectionOptions>) -> Output;
}

impl IntoConnectOptions<PgConnectOptions> for PgConnectionConfig {
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> PgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            PgSslMode::VerifyFull
        } else {
            PgSslMode::Prefer
        };

        let mut connect_options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .ssl_mode(ssl_mode);

        if self.tls.enabled {
            connect_options = connect_options
                .ssl_root_cert_from_pem(self.tls.trusted_root_certs.clone().into_bytes());
        }

        if let Some(password) = &self.password {
            connect_options = connect_options.password(password.expose_secret());
        }

        if let Some(options) = options {
            connect_options = connect_options.options(options.to_key_value_pairs());
        }

        connect_options
    }

    fn with_db(&self, options: Option<&PgConnectionOptions>) -> PgConnectOptions {
        let connect_options: PgConnectOptions = self.without_db(options);
        connect_options.database(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tls: TlsConfig) -> PgConnectionConfig {
        PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "roster".to_string(),
            username: "postgres".to_string(),
            password: None,
            tls,
        }
    }

    #[test]
    fn queue_options_carry_application_name() {
        let pairs = ROSTER_QUEUE_OPTIONS.to_key_value_pairs();

        assert!(pairs.contains(&("application_name".to_string(), "roster_queue".to_string())));
        assert!(pairs.contains(&("lock_timeout".to_string(), "2000".to_string())));
    }

    #[test]
    fn tls_without_certificates_is_rejected() {
        let tls = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };

        assert!(matches!(
            config(tls).validate(),
            Err(ValidationError::MissingTrustedRootCerts)
        ));
        assert!(config(TlsConfig::disabled()).validate().is_ok());
    }
}
