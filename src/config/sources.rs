use super::models::Config;
use config::{ConfigError, Environment, File};
use std::path::PathBuf;

/// Overrides the config file location
const CONFIG_PATH_VAR: &str = "UPBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/upbox.toml";
const ENV_PREFIX: &str = "UPBOX";
const ENV_SEPARATOR: &str = "__";

/// Resolve the config file path: `$UPBOX_CONFIG`, else `config/upbox.toml`.
///
/// A `.env` in the working directory is read first so it can set either.
fn config_path() -> PathBuf {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Read environment from {}", path.display());
    }

    std::env::var_os(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load() -> Result<Config, ConfigError> {
    load_from_sources(config_path())
}

/// Layer struct defaults, the TOML file at `config_path` (optional) and
/// `UPBOX__SECTION__KEY` environment variables, later sources winning.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let file_present = config_path.is_file();
    if file_present {
        tracing::info!(path = %config_path.display(), "Reading config file");
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
    }

    config::Config::builder()
        .add_source(File::from(config_path).required(file_present))
        .add_source(environment())
        .build()?
        .try_deserialize()
}

/// `UPBOX__UPLOAD__MAX_BYTES=10MB` sets `upload.max_bytes`;
/// `UPBOX__UPLOAD__ACCEPT="image/*,application/pdf"` splits into `upload.accept`
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .list_separator(",")
        .with_list_parse_key("upload.accept")
        .try_parsing(true)
}
