//! Filtering of dropped or selected files down to uploadable text files.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::error::ValidationError;
use crate::model::UploadEntry;
use crate::path_resolver::validate_entry_name;

/// Extensions accepted regardless of declared media type.
pub const TEXT_EXTENSIONS: &[&str] = &[
    ".js", ".jsx", ".ts", ".tsx", ".html", ".css", ".json", ".md", ".txt", ".py",
];

pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    Bytes(Vec<u8>),
    /// Read lazily, only once the file passed the type filter.
    Path(PathBuf),
}

/// A file handed to the uploader by a drop or file picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    /// Declared media type; guessed from the name when absent.
    pub media_type: Option<String>,
    pub source: CandidateSource,
}

impl CandidateFile {
    pub fn from_bytes(name: &str, media_type: Option<&str>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            media_type: media_type.map(str::to_string),
            source: CandidateSource::Bytes(bytes.into()),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            media_type: None,
            source: CandidateSource::Path(path),
        }
    }

    fn effective_media_type(&self) -> Option<String> {
        self.media_type
            .clone()
            .or_else(|| mime_guess::from_path(self.name.trim()).first().map(|m| m.essence_str().to_string()))
    }

    fn read_text(&self, max_bytes: u64) -> Result<String, RejectReason> {
        let bytes = match &self.source {
            CandidateSource::Bytes(bytes) => {
                if bytes.len() as u64 > max_bytes {
                    return Err(RejectReason::TooLarge {
                        size: bytes.len() as u64,
                        limit: max_bytes,
                    });
                }
                bytes.clone()
            }
            CandidateSource::Path(path) => {
                let size = std::fs::metadata(path)
                    .map_err(|e| RejectReason::ReadFailure(e.to_string()))?
                    .len();
                if size > max_bytes {
                    return Err(RejectReason::TooLarge { size, limit: max_bytes });
                }
                std::fs::read(path).map_err(|e| RejectReason::ReadFailure(e.to_string()))?
            }
        };
        String::from_utf8(bytes).map_err(|e| RejectReason::ReadFailure(e.to_string()))
    }
}

/// Why a candidate was left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// Bad name or non-text file.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("could not read file: {0}")]
    ReadFailure(String),
    #[error("file too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: u64 },
    #[error("path already exists: {0}")]
    PathExists(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub accepted: Vec<UploadEntry>,
    pub rejected: Vec<RejectedFile>,
}

impl UploadBatch {
    pub fn reject(&mut self, name: &str, reason: RejectReason) {
        self.rejected.push(RejectedFile {
            name: name.to_string(),
            reason,
        });
    }
}

/// Pure transform from candidates to creation requests. Each file is judged on
/// its own; a failure never aborts the rest of the batch.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_bytes: u64,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

impl UploadValidator {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }

    pub fn is_text_file(candidate: &CandidateFile) -> bool {
        if candidate
            .effective_media_type()
            .is_some_and(|mt| mt.starts_with("text/"))
        {
            return true;
        }
        let lower = candidate.name.trim().to_lowercase();
        TEXT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }

    pub fn validate(&self, candidates: &[CandidateFile]) -> UploadBatch {
        let mut batch = UploadBatch::default();
        for candidate in candidates {
            // Uploads are flat: a name that would nest under a folder is refused.
            let name = match validate_entry_name(&candidate.name) {
                Ok(name) => name,
                Err(err) => {
                    debug!(name = %candidate.name, error = %err, "Upload rejected: bad name");
                    batch.reject(&candidate.name, err.into());
                    continue;
                }
            };
            if !Self::is_text_file(candidate) {
                debug!(%name, "Upload rejected: not a text file");
                batch.reject(
                    &candidate.name,
                    ValidationError::UnsupportedFileType(name).into(),
                );
                continue;
            }
            match candidate.read_text(self.max_file_bytes) {
                Ok(content) => batch.accepted.push(UploadEntry {
                    // Uploads always land at the project root.
                    path: format!("/{name}"),
                    name,
                    content,
                }),
                Err(reason) => {
                    debug!(%name, %reason, "Upload rejected");
                    batch.reject(&candidate.name, reason);
                }
            }
        }
        batch
    }
}
