//! Error types for the outbox library.

use thiserror::Error;

/// Result type alias for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Errors that can occur while storing or relaying outbox events.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to publish an event to the message broker
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Generic error with context
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
