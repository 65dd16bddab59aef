use ulid::Ulid;

use crate::model::BookingStatus;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("instructor {instructor_id} has a conflicting booking at this time")]
    Conflict { instructor_id: Ulid },
    #[error("not allowed to act on this booking")]
    Forbidden,
    #[error("cannot {action} a booking in status {status}")]
    InvalidState {
        action: &'static str,
        status: BookingStatus,
    },
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl BookingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable code for the request layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}
