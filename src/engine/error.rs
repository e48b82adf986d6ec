use thiserror::Error;
use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// `arrival >= departure`, or an availability query with `from > to`.
    #[error("invalid date range: start must come before end")]
    BadRange,
    #[error("booking not found: {0}")]
    NotFound(Ulid),
    #[error("booking {0} is cancelled and cannot be modified")]
    NotModifiable(Ulid),
    #[error("dates unavailable: overlaps booking {conflicting}")]
    UnavailableDates { conflicting: Ulid },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl EngineError {
    /// Only infrastructure failures are worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::StorageUnavailable(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::NotActive(id) => EngineError::NotModifiable(id),
            StoreError::BadRange => EngineError::BadRange,
            StoreError::Conflict(conflicting) => EngineError::UnavailableDates { conflicting },
            StoreError::LimitExceeded(msg) => EngineError::LimitExceeded(msg),
            StoreError::Unavailable(msg) => EngineError::StorageUnavailable(msg),
        }
    }
}
