use serde::{Deserialize, Serialize};

/// Broad classification of store failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

/// Error raised by a backend. The message is what end users may get to see.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub code: ErrorCode,
    pub message: String,
}

impl StoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns the message when it carries readable text.
    pub fn readable_message(&self) -> Option<&str> {
        let trimmed = self.message.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(self.message.as_str())
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) fn invalid_argument(message: impl Into<String>) -> StoreError {
    StoreError::new(ErrorCode::InvalidInput, message)
}

pub(crate) fn conflict(message: impl Into<String>) -> StoreError {
    StoreError::new(ErrorCode::Conflict, message)
}

pub(crate) fn serde_error(err: serde_json::Error) -> StoreError {
    StoreError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(feature = "redis")]
pub(crate) fn redis_error(err: redis::RedisError) -> StoreError {
    StoreError::new(ErrorCode::Unavailable, err.to_string())
}
