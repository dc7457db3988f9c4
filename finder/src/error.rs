use thiserror::Error;

pub type FinderResult<T> = Result<T, FinderError>;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("youtube api error: {0}")]
    Youtube(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("outbox error: {0}")]
    Outbox(#[from] kafka_outbox::OutboxError),

    #[error(transparent)]
    Validation(#[from] crate::domain::ValidationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
