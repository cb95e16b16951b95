use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Upload endpoint '{endpoint}' must be an http:// or https:// URL")]
    InvalidEndpointScheme { endpoint: String },

    #[error("Transport chunk_size must be positive")]
    ZeroChunkSize,

    #[error("Transport timeout must be positive: {field} = 0")]
    ZeroTimeout { field: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_endpoint(&config.upload.endpoint)?;
    validate_transport(config)?;
    Ok(())
}

/// Empty means unset; anything else must be an http(s) URL
pub fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    if endpoint.is_empty() {
        return Ok(());
    }

    let lowered = endpoint.to_ascii_lowercase();
    if !lowered.starts_with("http://") && !lowered.starts_with("https://") {
        return Err(ValidationError::InvalidEndpointScheme {
            endpoint: endpoint.to_string(),
        });
    }

    Ok(())
}

fn validate_transport(config: &Config) -> Result<(), ValidationError> {
    if config.transport.chunk_size.is_zero() {
        return Err(ValidationError::ZeroChunkSize);
    }

    for (field, value) in [
        ("connect_timeout_secs", config.transport.connect_timeout_secs),
        ("request_timeout_secs", config.transport.request_timeout_secs),
    ] {
        if value == 0 {
            return Err(ValidationError::ZeroTimeout {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_endpoint_scheme() {
        assert!(validate_endpoint("http://localhost:8080/upload").is_ok());
        assert!(validate_endpoint("HTTPS://example.com").is_ok());
        assert!(matches!(
            validate_endpoint("ftp://example.com"),
            Err(ValidationError::InvalidEndpointScheme { .. })
        ));
    }

    #[test]
    fn test_zero_chunk_size() {
        let mut config = Config::default();
        config.transport.chunk_size = ByteSize(0);
        assert!(matches!(validate(&config), Err(ValidationError::ZeroChunkSize)));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.transport.request_timeout_secs = 0;
        let err = validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ZeroTimeout { ref field } if field == "request_timeout_secs"
        ));
    }
}
