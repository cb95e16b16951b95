//! Transport capability used by the orchestrator to send one multipart request.
//!
//! The orchestrator only depends on the [`Transporter`] trait. [`HttpTransporter`]
//! is the reqwest-backed implementation; tests and embedders can supply their own.

pub mod http;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::progress::ProgressSample;
use crate::selection::{FileDescriptor, FileSelection};

pub use http::{HttpConfig, HttpTransporter};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("cannot read file '{name}': {message}")]
    FileUnreadable { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Channel the transporter reports byte progress on
pub type ProgressSender = mpsc::UnboundedSender<ProgressSample>;

/// Settled HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportResponse {
    pub code: u16,
    pub body: String,
    pub status_line: String,
}

impl TransportResponse {
    /// Codes 200 through 399 count as a successful upload
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.code)
    }
}

/// Caller data attached to an upload.
///
/// Passed back to every hook and appended to the form as text fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserData(Map<String, Value>);

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries coerced to strings for the multipart form
    pub fn form_fields(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.0.iter().map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
    }
}

impl From<Map<String, Value>> for UserData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for UserData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File(FileDescriptor),
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

/// Everything a transporter needs to send one upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub fields: Vec<FormField>,
}

impl UploadRequest {
    /// Files become `file1`, `file2`, ... in selection order, followed by
    /// the user data entries as text fields.
    pub fn new(url: impl Into<String>, selection: &FileSelection, user_data: &UserData) -> Self {
        let files = selection.iter().enumerate().map(|(idx, file)| FormField {
            name: format!("file{}", idx + 1),
            value: FormValue::File(file.clone()),
        });
        let texts = user_data.form_fields().map(|(name, text)| FormField {
            name,
            value: FormValue::Text(text),
        });

        Self {
            url: url.into(),
            fields: files.chain(texts).collect(),
        }
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &FileDescriptor)> {
        self.fields.iter().filter_map(|field| match &field.value {
            FormValue::File(file) => Some((field.name.as_str(), file)),
            FormValue::Text(_) => None,
        })
    }
}

/// Sends a multipart upload and reports byte progress while doing so.
///
/// `send` settles exactly once. Samples pushed on `progress` before it
/// settles are delivered to hooks in order.
#[async_trait]
pub trait Transporter: Send + Sync {
    /// Whether this transporter can be used in the current environment
    fn is_available(&self) -> bool {
        true
    }

    async fn send(&self, request: UploadRequest, progress: ProgressSender)
    -> Result<TransportResponse>;
}
