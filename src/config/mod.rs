//! Settings for upload limits and the HTTP transport.
//!
//! Values come from three layers, each overriding the one before:
//! struct defaults, a TOML file, then `UPBOX__<SECTION>__<KEY>` environment
//! variables. The file is `config/upbox.toml` unless `UPBOX_CONFIG` points
//! elsewhere, and a missing file is not an error.
//!
//! ```no_run
//! use upbox::config::Config;
//!
//! let config = Config::load()?;
//! println!("endpoint: {}", config.upload.endpoint);
//! # Ok::<(), upbox::config::ConfigError>(())
//! ```
//!
//! ```text
//! UPBOX__UPLOAD__ENDPOINT=https://example.com/upload
//! UPBOX__UPLOAD__MAX_BYTES=10MB
//! UPBOX__UPLOAD__ACCEPT=image/*,application/pdf
//! UPBOX__TRANSPORT__REQUEST_TIMEOUT_SECS=60
//! ```

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::ByteSize;
pub use models::{Config, TransportConfig, UploadConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load from the default file location and the environment, then validate
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`Config::load`] with an explicit file path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check endpoint scheme, chunk size and timeouts; run again after CLI overrides
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load_str(contents: &str) -> Result<Config, ConfigError> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upbox.toml");
        std::fs::write(&path, contents).unwrap();
        Config::load_from_path(path)
    }

    #[test]
    fn endpoint_only() {
        let config = load_str("[upload]\nendpoint = \"http://localhost:8080/upload\"\n").unwrap();
        assert_eq!(config.upload.endpoint, "http://localhost:8080/upload");
        assert!(config.upload.accept.is_empty());
        assert_eq!(config.transport, TransportConfig::default());
    }

    #[test]
    fn non_http_endpoint_is_rejected_on_load() {
        let err = load_str("[upload]\nendpoint = \"file:///tmp/drop\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError(ValidationError::InvalidEndpointScheme { .. })
        ));
    }

    #[test]
    fn every_key() {
        let config = load_str(
            r#"
[upload]
endpoint = "https://example.com/upload?token=abc"
max_files = 2
max_bytes = 1000
accept = ["image/*"]
eta_quantum_secs = 0

[transport]
connect_timeout_secs = 5
request_timeout_secs = 120
user_agent = "uploader/2.0"
chunk_size = "16KB"
"#,
        )
        .unwrap();

        assert_eq!(config.upload.max_files, 2);
        assert_eq!(config.upload.max_bytes, ByteSize(1000));
        assert_eq!(config.upload.eta_quantum_secs, 0);
        assert_eq!(config.transport.connect_timeout_secs, 5);
        assert_eq!(config.transport.user_agent, "uploader/2.0");
        assert_eq!(config.transport.chunk_size, ByteSize(16 * 1024));
    }

    #[test]
    fn overrides_are_revalidated() {
        let mut config: Config = toml::from_str(
            r#"
[upload]
endpoint = "http://127.0.0.1:3000/upload"
accept = ["image/png", "application/*"]
"#,
        )
        .unwrap();
        assert_eq!(config.upload.accept.len(), 2);
        assert!(config.validate().is_ok());

        config.upload.endpoint = "ftp://127.0.0.1/upload".to_string();
        assert!(config.validate().is_err());

        let bad: Result<Config, _> = toml::from_str("[upload]\naccept = [\"png\"]\n");
        assert!(bad.is_err());
    }
}
