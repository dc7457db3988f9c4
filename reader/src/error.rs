use thiserror::Error;

/// Failure of an open chat stream, already translated from the transport.
///
/// The first three kinds are terminal for the stream being read: the reader
/// marks the progress finished with the error's message as the reason and
/// moves on. Everything else is retried on the next scan.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("chat not found")]
    ChatNotFound,

    #[error("chat is offline")]
    ChatOffline,

    #[error("unavailable live stream")]
    UnavailableLiveStream,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StreamError {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamError::ChatNotFound
                | StreamError::ChatOffline
                | StreamError::UnavailableLiveStream
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_the_persisted_finish_reasons() {
        assert_eq!(StreamError::ChatNotFound.to_string(), "chat not found");
        assert_eq!(StreamError::ChatOffline.to_string(), "chat is offline");
        assert_eq!(
            StreamError::UnavailableLiveStream.to_string(),
            "unavailable live stream"
        );
    }

    #[test]
    fn only_the_three_kinds_are_terminal() {
        assert!(StreamError::ChatNotFound.is_terminal());
        assert!(StreamError::ChatOffline.is_terminal());
        assert!(StreamError::UnavailableLiveStream.is_terminal());
        assert!(!StreamError::Other(anyhow::anyhow!("boom")).is_terminal());
    }
}
