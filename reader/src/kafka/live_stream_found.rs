use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::MessageHandler;
use crate::domain::LiveStreamProgress;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Insert the given live stream progress, ignoring duplicates.
    async fn insert(&self, progress: &LiveStreamProgress) -> anyhow::Result<()>;
}

/// Payload of a `live_stream.found` event. Only the fields needed to start
/// reading are required; the rest travels for downstream consumers.
#[derive(Debug, Deserialize)]
struct LiveStreamFoundPayload {
    #[serde(rename = "videoId")]
    video_id: String,
    #[serde(rename = "chatId")]
    chat_id: String,
    #[serde(rename = "scheduledStart")]
    scheduled_start: DateTime<Utc>,
}

/// Inserts a fresh reading progress for every found live stream. Redelivered
/// events collapse on the duplicate-tolerant insert.
pub struct LiveStreamFoundHandler {
    progress: Arc<dyn ProgressStore>,
}

impl LiveStreamFoundHandler {
    pub fn new(progress: Arc<dyn ProgressStore>) -> Self {
        Self { progress }
    }
}

#[async_trait]
impl MessageHandler for LiveStreamFoundHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let payload: LiveStreamFoundPayload =
            serde_json::from_slice(payload).context("unmarshal event payload")?;

        let lsp = LiveStreamProgress::new(
            payload.video_id,
            payload.chat_id,
            payload.scheduled_start,
        )
        .context("new live stream progress")?;

        self.progress
            .insert(&lsp)
            .await
            .context("insert live stream progress")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProgressStore {
        inserted: Mutex<Vec<LiveStreamProgress>>,
        fail: bool,
    }

    #[async_trait]
    impl ProgressStore for FakeProgressStore {
        async fn insert(&self, progress: &LiveStreamProgress) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("insert failed");
            }

            self.inserted.lock().unwrap().push(progress.clone());

            Ok(())
        }
    }

    fn payload() -> Vec<u8> {
        serde_json::json!({
            "videoId": "v1",
            "chatId": "c1",
            "scheduledStart": "2024-05-02T18:00:00Z",
            "title": "launch stream",
            "channelId": "ch1",
            "thumbnailUrl": "https://i.ytimg.com/vi/v1/maxresdefault.jpg",
            "publishedAt": "2024-05-01T12:00:00Z"
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn inserts_progress_from_event() {
        let store = Arc::new(FakeProgressStore::default());
        let handler = LiveStreamFoundHandler::new(store.clone());

        handler.handle(&payload()).await.unwrap();

        let inserted = store.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].id(), "v1");
        assert_eq!(inserted[0].chat_id(), "c1");
        assert_eq!(inserted[0].next_page_token(), "");
        assert!(!inserted[0].is_finished());
    }

    #[tokio::test]
    async fn rejects_malformed_payload() {
        let store = Arc::new(FakeProgressStore::default());
        let handler = LiveStreamFoundHandler::new(store.clone());

        assert!(handler.handle(b"not json").await.is_err());
        assert!(store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_payload_missing_required_fields() {
        let store = Arc::new(FakeProgressStore::default());
        let handler = LiveStreamFoundHandler::new(store.clone());

        let payload = serde_json::json!({
            "videoId": "v1",
            "scheduledStart": "2024-05-02T18:00:00Z"
        })
        .to_string()
        .into_bytes();

        assert!(handler.handle(&payload).await.is_err());
    }

    #[tokio::test]
    async fn rejects_empty_required_fields() {
        let store = Arc::new(FakeProgressStore::default());
        let handler = LiveStreamFoundHandler::new(store.clone());

        let payload = serde_json::json!({
            "videoId": "v1",
            "chatId": "",
            "scheduledStart": "2024-05-02T18:00:00Z"
        })
        .to_string()
        .into_bytes();

        let err = handler.handle(&payload).await.unwrap_err();
        assert!(err.to_string().contains("new live stream progress"));
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = Arc::new(FakeProgressStore {
            fail: true,
            ..FakeProgressStore::default()
        });
        let handler = LiveStreamFoundHandler::new(store);

        assert!(handler.handle(&payload()).await.is_err());
    }
}
