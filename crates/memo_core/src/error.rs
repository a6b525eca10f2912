use thiserror::Error;

use crate::model::ReminderId;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("description of the reminder cannot be empty")]
    EmptyDescription,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("reminder `{0}` not found")]
pub struct NotFoundError(pub ReminderId);

/// Failure of a single remote round-trip. Never retried.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to write reminder `{key}`")]
    WriteFailed {
        key: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to delete reminder `{key}`")]
    DeleteFailed {
        key: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to upload attachment to `{path}`")]
    UploadFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to resolve public url for `{path}`")]
    UrlFetchFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to download attachment from `{url}`")]
    DownloadFailed {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }
}

/// Why a remote child was left out of a snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("child is not an object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}
