use thiserror::Error;

use crate::types::ContactId;

pub type SegmentationResult<T> = Result<T, SegmentationError>;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Contact store unavailable: {0}")]
    StoreUnavailable(String),

    /// Nothing from the batch was written.
    #[error("Membership batch rejected: {} unknown contact id(s)", rejected.len())]
    PartialBatchFailure { rejected: Vec<ContactId> },
}

/// Failure reported by a contact store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("query rejected by store: {0}")]
    Query(String),
}

impl From<StoreError> for SegmentationError {
    fn from(err: StoreError) -> Self {
        SegmentationError::StoreUnavailable(err.to_string())
    }
}

impl SegmentationError {
    /// Recount failures of this kind leave the cached count in place.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, SegmentationError::StoreUnavailable(_))
    }
}
