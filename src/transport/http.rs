//! HTTP transporter: one streaming multipart POST per upload

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, Stream, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{
    FormValue, ProgressSender, Result, TransportError, TransportResponse, Transporter,
    UploadRequest,
};
use crate::config::TransportConfig;
use crate::progress::ProgressSample;
use crate::selection::{FileBody, FileDescriptor};

type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Size of the body chunks progress is reported for
    pub chunk_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            user_agent: "upbox/0.1.0".to_string(),
            chunk_size: 64 * 1024,
        }
    }
}

impl From<&TransportConfig> for HttpConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            user_agent: config.user_agent.clone(),
            chunk_size: usize::try_from(config.chunk_size.as_u64())
                .unwrap_or(usize::MAX)
                .max(1),
        }
    }
}

/// reqwest-backed [`Transporter`]
pub struct HttpTransporter {
    client: Client,
    config: HttpConfig,
}

enum PendingField {
    Text(String, String),
    File {
        name: String,
        file: FileDescriptor,
        chunks: ChunkStream,
        len: u64,
    },
}

impl HttpTransporter {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Open a file's content as a chunk stream, returning its actual length
    async fn open(&self, file: &FileDescriptor) -> Result<(ChunkStream, u64)> {
        let chunk_size = self.config.chunk_size.max(1);

        match &file.body {
            FileBody::Memory(data) => {
                let data = data.clone();
                let len = data.len() as u64;
                let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
                    .step_by(chunk_size)
                    .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
                    .collect();
                Ok((Box::pin(stream::iter(chunks)), len))
            }
            FileBody::Path(path) => {
                let unreadable = |e: std::io::Error| TransportError::FileUnreadable {
                    name: file.name.clone(),
                    message: e.to_string(),
                };
                let handle = tokio::fs::File::open(path).await.map_err(unreadable)?;
                let len = handle.metadata().await.map_err(unreadable)?.len();
                let chunks: ChunkStream = Box::pin(ReaderStream::with_capacity(handle, chunk_size));
                Ok((chunks, len))
            }
        }
    }

    async fn build_form(&self, request: UploadRequest, progress: ProgressSender) -> Result<Form> {
        let mut pending = Vec::with_capacity(request.fields.len());
        for field in request.fields {
            match field.value {
                FormValue::Text(text) => pending.push(PendingField::Text(field.name, text)),
                FormValue::File(file) => {
                    let (chunks, len) = self.open(&file).await?;
                    pending.push(PendingField::File {
                        name: field.name,
                        file,
                        chunks,
                        len,
                    });
                }
            }
        }

        let bytes_total: u64 = pending
            .iter()
            .map(|field| match field {
                PendingField::File { len, .. } => *len,
                PendingField::Text(..) => 0,
            })
            .sum();
        let bytes_sent = Arc::new(AtomicU64::new(0));

        let mut form = Form::new();
        for field in pending {
            form = match field {
                PendingField::Text(name, text) => form.text(name, text),
                PendingField::File {
                    name,
                    file,
                    chunks,
                    len,
                } => {
                    let counter = Arc::clone(&bytes_sent);
                    let progress = progress.clone();
                    let reported = chunks.inspect_ok(move |chunk| {
                        let sent = counter.fetch_add(chunk.len() as u64, Ordering::Relaxed)
                            + chunk.len() as u64;
                        // The orchestrator may have settled already; late samples are dropped.
                        let _ = progress.send(ProgressSample {
                            bytes_sent: sent,
                            bytes_total,
                        });
                    });

                    let mut part = Part::stream_with_length(Body::wrap_stream(reported), len)
                        .file_name(file.name.clone());
                    if !file.mime_type.is_empty() {
                        part = part.mime_str(&file.mime_type).map_err(|e| {
                            TransportError::RequestFailed(format!(
                                "invalid MIME type for '{}': {}",
                                file.name, e
                            ))
                        })?;
                    }
                    form.part(name, part)
                }
            };
        }

        Ok(form)
    }
}

#[async_trait]
impl Transporter for HttpTransporter {
    async fn send(
        &self,
        request: UploadRequest,
        progress: ProgressSender,
    ) -> Result<TransportResponse> {
        let url = request.url.clone();
        debug!(url = %url, fields = request.fields.len(), "Building multipart form");

        let form = self.build_form(request, progress).await?;

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else if e.is_builder() {
                    TransportError::InvalidUrl(format!("{}: {}", url, e))
                } else {
                    TransportError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::RequestFailed(format!("Failed to read body: {}", e)))?;

        debug!(url = %url, code = status.as_u16(), size = body.len(), "Upload request settled");

        Ok(TransportResponse {
            code: status.as_u16(),
            body,
            status_line: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}
