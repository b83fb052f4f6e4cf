//! Queue-specific error taxonomy, mirroring the stable numeric codes from
//! `dispatch_core::CoreError`'s 3xxx range.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is full (capacity {capacity})")]
    Full { code: u16, capacity: usize },

    #[error("queue is closed")]
    Closed { code: u16 },

    #[error("internal queue error: {message}")]
    Internal { code: u16, message: String },
}

impl QueueError {
    pub fn code(&self) -> u16 {
        match self {
            QueueError::Full { code, .. } => *code,
            QueueError::Closed { code } => *code,
            QueueError::Internal { code, .. } => *code,
        }
    }

    pub fn full(capacity: usize) -> Self {
        QueueError::Full { code: 3000, capacity }
    }

    pub fn closed() -> Self {
        QueueError::Closed { code: 3001 }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        QueueError::Internal { code: 3002, message: message.into() }
    }
}

impl From<QueueError> for dispatch_core::CoreError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full { .. } => dispatch_core::CoreError::queue_full(),
            QueueError::Closed { .. } => dispatch_core::CoreError::queue_closed(),
            QueueError::Internal { message, .. } => dispatch_core::CoreError::internal(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
