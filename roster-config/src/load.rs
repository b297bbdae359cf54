use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory holding the configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions tried, in order, for each configuration file.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix of environment variable overrides (`APP_QUEUE__CONCURRENCY=8`).
const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator between nested keys in environment variable overrides.
const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Implemented by every top-level configuration type that can be loaded with [`load_config`].
pub trait Config {
    /// Keys whose environment variable overrides are split on commas into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

#[derive(Debug, Clone, Copy)]
enum ConfigFile {
    Base,
    Overlay(Environment),
}

impl ConfigFile {
    fn stem(&self) -> &'static str {
        match self {
            ConfigFile::Base => "base",
            ConfigFile::Overlay(environment) => environment.as_str(),
        }
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFile::Base => f.write_str("base configuration"),
            ConfigFile::Overlay(environment) => write!(f, "{environment} configuration"),
        }
    }
}

/// Errors raised while assembling a configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate the {file} in `{directory}`, tried {attempted}")]
    ConfigurationFileMissing {
        file: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load the {file} from `{path}`: {source}")]
    ConfigurationFileLoad {
        file: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to build the configuration: {0}")]
    Builder(#[source] config::ConfigError),

    #[error("failed to deserialize the configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads a configuration from `./configuration` for the environment named by `APP_ENVIRONMENT`.
///
/// The base file is read first, then the environment overlay, then `APP_`-prefixed
/// environment variables. Nested keys use a double underscore (`APP_AUTH__JWT_SECRET`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let directory = std::env::current_dir()
        .map_err(LoadConfigError::CurrentDir)?
        .join(CONFIGURATION_DIR);
    let environment = Environment::load()?;

    load_config_from(&directory, environment)
}

/// Loads a configuration from an explicit directory and environment.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base_file = find_configuration_file(directory, ConfigFile::Base)?;
    let overlay_file = find_configuration_file(directory, ConfigFile::Overlay(environment))?;

    let builder = config::Config::builder().add_source(config::File::from(base_file.clone()));
    check_source(&builder, ConfigFile::Base, &base_file)?;

    let builder = builder.add_source(config::File::from(overlay_file.clone()));
    check_source(&builder, ConfigFile::Overlay(environment), &overlay_file)?;

    let builder = builder.add_source(environment_source::<T>());

    builder
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn environment_source<T: Config>() -> config::Environment {
    let mut source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        source = source.try_parsing(true).list_separator(LIST_SEPARATOR);
        for key in T::LIST_PARSE_KEYS {
            source = source.with_list_parse_key(key);
        }
    }

    source
}

fn find_configuration_file(directory: &Path, file: ConfigFile) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", file.stem())))
        .collect();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let attempted = candidates
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        file: file.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
}

/// Builds the sources gathered so far so that a malformed file is reported by name.
fn check_source(
    builder: &ConfigBuilder<DefaultState>,
    file: ConfigFile,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map(|_| ())
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            file: file.to_string(),
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        workers: u16,
    }

    impl Config for Sample {
        const LIST_PARSE_KEYS: &'static [&'static str] = &[];
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "roster-config-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn overlay_overrides_base_values() {
        let dir = scratch_dir("overlay");
        std::fs::write(dir.join("base.yaml"), "name: roster\nworkers: 2\n").unwrap();
        std::fs::write(dir.join("prod.yaml"), "workers: 8\n").unwrap();

        let sample: Sample = load_config_from(&dir, Environment::Prod).unwrap();

        assert_eq!(sample.name, "roster");
        assert_eq!(sample.workers, 8);
    }

    #[test]
    fn missing_overlay_is_reported() {
        let dir = scratch_dir("missing");
        std::fs::write(dir.join("base.yaml"), "name: roster\nworkers: 2\n").unwrap();

        let err = load_config_from::<Sample>(&dir, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::ConfigurationFileMissing { .. }
        ));
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = std::env::temp_dir().join("roster-config-does-not-exist");

        let err = load_config_from::<Sample>(&dir, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::MissingConfigurationDirectory(_)
        ));
    }
}
