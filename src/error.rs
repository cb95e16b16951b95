use thiserror::Error;

use crate::transport::TransportError;
use crate::validation::ValidationError;

/// Failure delivered to the `error` hook
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Your environment is unsupported: no usable transport")]
    UnsupportedEnvironment,
    #[error("Error uploading files: HTTP {code} {status_line}")]
    Http { code: u16, status_line: String },
    #[error("Error uploading files: {message}")]
    Transport { message: String },
}

impl UploadError {
    /// Stable machine-readable code for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::Validation(err) => err.kind(),
            UploadError::UnsupportedEnvironment => "unsupported",
            UploadError::Http { .. } => "http",
            UploadError::Transport { .. } => "transport",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, UploadError::Validation(_))
    }
}

impl From<TransportError> for UploadError {
    fn from(value: TransportError) -> Self {
        UploadError::Transport {
            message: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let err: UploadError = ValidationError::TooManyFiles { limit: 2 }.into();
        assert_eq!(err.kind(), "too_many_files");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Too many files were selected. Please only select 2."
        );

        let http = UploadError::Http {
            code: 502,
            status_line: "Bad Gateway".to_string(),
        };
        assert_eq!(http.kind(), "http");
        assert_eq!(http.to_string(), "Error uploading files: HTTP 502 Bad Gateway");
    }

    #[test]
    fn transport_error_converts() {
        let err: UploadError = TransportError::Timeout.into();
        assert_eq!(err.kind(), "transport");
        assert_eq!(err.to_string(), "Error uploading files: Connection timeout");
    }
}
