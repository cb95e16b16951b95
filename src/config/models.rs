use crate::humanize::ByteSize;
use crate::validation::MimePattern;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Upload limits and destination
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Base URL uploads are posted to; empty until configured
    #[serde(default)]
    pub endpoint: String,
    /// Maximum files per upload, 0 = unbounded
    #[serde(default)]
    pub max_files: usize,
    /// Maximum total bytes per upload, 0 = unbounded
    #[serde(default)]
    pub max_bytes: ByteSize,
    /// Accepted MIME patterns (`image/*`); empty accepts everything
    #[serde(default)]
    pub accept: Vec<MimePattern>,
    #[serde(default = "default_eta_quantum_secs")]
    pub eta_quantum_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            max_files: 0,
            max_bytes: ByteSize(0),
            accept: Vec::new(),
            eta_quantum_secs: default_eta_quantum_secs(),
        }
    }
}

fn default_eta_quantum_secs() -> u64 {
    10
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: ByteSize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("upbox/{}", env!("CARGO_PKG_VERSION"))
}

fn default_chunk_size() -> ByteSize {
    ByteSize(64 * 1024) // 64 KB
}
