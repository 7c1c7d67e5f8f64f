use crate::models::CandidateId;
use crate::services::{ClientError, WorkbookError};
use thiserror::Error;

/// Errors raised by the review workflow
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Nothing to undo")]
    EmptyUndo,

    #[error("Candidate {0} is not in the review queue")]
    UnknownCandidate(CandidateId),

    #[error("Row {index} is outside the queue (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Page size must be at least 1")]
    InvalidPageSize,

    #[error("Progress polling failed: {0}")]
    PollingFailed(String),

    #[error("Progress polling was cancelled before the job finished")]
    PollingCancelled,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

impl ReviewError {
    /// Whether the remote service rejected the request because its state had moved on
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReviewError::Client(ClientError::Conflict(_)))
    }
}
