use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::UploadConfig;
use crate::selection::FileSelection;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Too many files were selected. Please only select {limit}.")]
    TooManyFiles { limit: usize },
    #[error("File size too large: {total_bytes} bytes (limit {limit} bytes)")]
    TooLarge { total_bytes: u64, limit: u64 },
    #[error("File type not accepted: {file_name} ({mime_type})")]
    TypeRejected { file_name: String, mime_type: String },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::TooManyFiles { .. } => "too_many_files",
            ValidationError::TooLarge { .. } => "too_large",
            ValidationError::TypeRejected { .. } => "type_rejected",
        }
    }
}

/// Check a selection against the configured limits.
///
/// Count, then total size, then type; only the first violation is reported.
pub fn validate(selection: &FileSelection, config: &UploadConfig) -> Result<(), ValidationError> {
    if config.max_files > 0 && selection.len() > config.max_files {
        return Err(ValidationError::TooManyFiles {
            limit: config.max_files,
        });
    }

    if !config.max_bytes.is_zero() {
        let total_bytes = selection.total_bytes();
        if total_bytes > config.max_bytes.as_u64() {
            return Err(ValidationError::TooLarge {
                total_bytes,
                limit: config.max_bytes.as_u64(),
            });
        }
    }

    if !config.accept.is_empty() {
        for file in selection {
            if !config.accept.iter().any(|p| p.matches(&file.mime_type)) {
                return Err(ValidationError::TypeRejected {
                    file_name: file.name.clone(),
                    mime_type: file.mime_type.clone(),
                });
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MIME pattern '{0}', expected type/subtype")]
pub struct PatternError(pub String);

/// Accepted-type pattern such as `image/*` or `application/pdf`.
///
/// `*` stands for one or more characters and never crosses the `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MimePattern {
    kind: String,
    subtype: String,
}

impl MimePattern {
    pub fn matches(&self, mime_type: &str) -> bool {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.split_once('/') {
            Some((kind, subtype)) => {
                glob_match(self.kind.as_bytes(), kind.as_bytes())
                    && glob_match(self.subtype.as_bytes(), subtype.as_bytes())
            }
            None => false,
        }
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (1..=text.len()).any(|i| glob_match(rest, &text[i..])),
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}

impl FromStr for MimePattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let invalid = || PatternError(s.to_string());

        let (kind, subtype) = normalized.split_once('/').ok_or_else(invalid)?;
        let segment_ok = |seg: &str| {
            !seg.is_empty() && !seg.contains('/') && !seg.chars().any(char::is_whitespace)
        };
        if !segment_ok(kind) || !segment_ok(subtype) {
            return Err(invalid());
        }

        Ok(Self {
            kind: kind.to_string(),
            subtype: subtype.to_string(),
        })
    }
}

impl TryFrom<String> for MimePattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MimePattern> for String {
    fn from(pattern: MimePattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for MimePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)
    }
}
