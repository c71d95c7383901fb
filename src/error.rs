use thiserror::Error;

use crate::model::NodeId;

/// Input rejected before any request is issued. No state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("invalid name '{0}'")]
    InvalidName(String),
    #[error("a file or folder already exists at {0}")]
    DuplicatePath(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
}

/// A create/save/upload request that the backend rejected or never answered.
/// Local state is left untouched so the user can retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Invalid terminal session transition. Callers treat these as no-ops; the UI
/// is expected to gate input on `is_ready`/`is_connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionStateError {
    #[error("terminal session is already active")]
    AlreadyActive,
    #[error("previous terminal session is still shutting down")]
    TeardownPending,
    #[error("terminal is not ready for input")]
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("no file selected")]
    NoFileSelected,
    #[error("save failed: {0}")]
    SaveFailed(#[source] PersistenceError),
    #[error("unknown file {0}")]
    UnknownFile(NodeId),
}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PersistenceError::Decode(err.to_string())
        } else {
            PersistenceError::Network(err.to_string())
        }
    }
}
