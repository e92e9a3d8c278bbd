use serde::Serialize;

use super::repository::RepositoryError;

/// Error raised by the stage list manager and the transition engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl PipelineError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotFound(_) | PipelineError::Store(RepositoryError::NotFound) => {
                ErrorKind::NotFound
            }
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Conflict(_) | PipelineError::Store(RepositoryError::Conflict(_)) => {
                ErrorKind::Conflict
            }
            PipelineError::Store(RepositoryError::Unavailable(_)) => ErrorKind::Unavailable,
        }
    }

    /// Transient failures may be retried as a whole with fresh data.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Unavailable)
    }
}

/// Coarse error classification exposed to API callers and bulk reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unavailable,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}
