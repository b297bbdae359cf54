use std::fmt;
use std::io;

/// Environment variable selecting the runtime environment.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

const DEV_ENV_NAME: &str = "dev";

const PROD_ENV_NAME: &str = "prod";

/// Runtime environment the service is deployed in.
///
/// Selects which `configuration/{environment}.yaml` overlay is loaded on top of the base file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    /// Reads `APP_ENVIRONMENT`, falling back to [`Environment::Dev`] when it is unset.
    pub fn load() -> Result<Environment, io::Error> {
        match std::env::var(APP_ENVIRONMENT_ENV_NAME) {
            Ok(value) => Environment::try_from(value),
            Err(_) => Ok(Environment::Dev),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => DEV_ENV_NAME,
            Environment::Prod => PROD_ENV_NAME,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Environment {
    type Error = io::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            DEV_ENV_NAME => Ok(Environment::Dev),
            PROD_ENV_NAME => Ok(Environment::Prod),
            other => Err(io::Error::other(format!(
                "`{other}` is not a supported environment, expected `{DEV_ENV_NAME}` or `{PROD_ENV_NAME}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_environments_case_insensitively() {
        assert_eq!(
            Environment::try_from("DEV".to_string()).unwrap(),
            Environment::Dev
        );
        assert_eq!(
            Environment::try_from(" prod ".to_string()).unwrap(),
            Environment::Prod
        );
    }

    #[test]
    fn rejects_unknown_environment() {
        let err = Environment::try_from("staging".to_string()).unwrap_err();
        assert!(err.to_string().contains("staging"));
    }
}
