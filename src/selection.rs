//! File selections and the sources that produce them.
//!
//! A [`FileSelection`] is the batch of files submitted as one upload. It is
//! produced by a [`FilePicker`] (or built directly by the caller) and handed
//! to the orchestrator by value, so each upload owns its own snapshot.

use async_trait::async_trait;
use bytes::Bytes;
use mime::Mime;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Where a file's content comes from when the transporter streams it
#[derive(Debug, Clone)]
pub enum FileBody {
    Memory(Bytes),
    Path(PathBuf),
}

impl Default for FileBody {
    fn default() -> Self {
        FileBody::Memory(Bytes::new())
    }
}

/// One file of a selection
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub name: String,
    /// Declared size; `None` when the source could not report one
    pub size_bytes: Option<u64>,
    pub mime_type: String,
    pub body: FileBody,
}

impl FileDescriptor {
    /// Describe a file without content (size and type only)
    pub fn new(name: impl Into<String>, size_bytes: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes: Some(size_bytes),
            mime_type: mime_type.into(),
            body: FileBody::default(),
        }
    }

    /// In-memory file; the declared size is the content length
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size_bytes: Some(data.len() as u64),
            mime_type: mime_type.into(),
            body: FileBody::Memory(data),
        }
    }

    /// Size used for limits and progress; a missing size counts as zero
    pub fn size(&self) -> u64 {
        self.size_bytes.unwrap_or(0)
    }
}

/// Ordered, immutable batch of files
#[derive(Debug, Clone, Default)]
pub struct FileSelection {
    files: Vec<FileDescriptor>,
}

impl FileSelection {
    pub fn new(files: Vec<FileDescriptor>) -> Self {
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileDescriptor> {
        self.files.iter()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files
            .iter()
            .fold(0u64, |acc, file| acc.saturating_add(file.size()))
    }
}

impl FromIterator<FileDescriptor> for FileSelection {
    fn from_iter<I: IntoIterator<Item = FileDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FileSelection {
    type Item = &'a FileDescriptor;
    type IntoIter = std::slice::Iter<'a, FileDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

#[derive(Debug, Error)]
pub enum PickError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{0}' is not a regular file")]
    NotAFile(PathBuf),
}

/// Source of file selections (file dialog, drop target, path list, ...)
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// Produce the user's selection; an empty selection means nothing was chosen
    async fn pick(&self) -> Result<FileSelection, PickError>;
}

/// Picker over a fixed list of filesystem paths
#[derive(Debug, Clone, Default)]
pub struct PathPicker {
    paths: Vec<PathBuf>,
}

impl PathPicker {
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    async fn describe(path: &Path) -> Result<FileDescriptor, PickError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|source| PickError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if !metadata.is_file() {
            return Err(PickError::NotAFile(path.to_path_buf()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(FileDescriptor {
            name,
            size_bytes: Some(metadata.len()),
            mime_type: guess_mime(path).to_string(),
            body: FileBody::Path(path.to_path_buf()),
        })
    }
}

#[async_trait]
impl FilePicker for PathPicker {
    async fn pick(&self) -> Result<FileSelection, PickError> {
        let mut files = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let file = Self::describe(path).await?;
            debug!(name = %file.name, size = file.size(), mime = %file.mime_type, "File picked");
            files.push(file);
        }
        Ok(FileSelection::new(files))
    }
}

/// Guess a MIME type from the file extension, falling back to `application/octet-stream`
pub fn guess_mime(path: &Path) -> Mime {
    mime_guess::from_path(path).first_or_octet_stream()
}
