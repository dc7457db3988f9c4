use async_trait::async_trait;
use kafka_outbox::{OutboxEvent, OutboxStore, SqlxOutboxStore};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::domain::LiveStream;
use crate::error::FinderResult;
use crate::find::StreamStore;

/// PostgreSQL store for discovered live streams. `persist` writes the stream
/// rows and their `live_stream.found` outbox rows in one transaction.
pub struct PgStreamStore {
    pool: PgPool,
    outbox: SqlxOutboxStore,
    topic: String,
}

impl PgStreamStore {
    pub fn new(pool: PgPool, topic: impl Into<String>) -> Self {
        Self {
            pool: pool.clone(),
            outbox: SqlxOutboxStore::new(pool),
            topic: topic.into(),
        }
    }

    async fn insert_streams(
        tx: &mut Transaction<'_, Postgres>,
        live_streams: &[LiveStream],
    ) -> Result<(), sqlx::Error> {
        let mut ids = Vec::with_capacity(live_streams.len());
        let mut titles = Vec::with_capacity(live_streams.len());
        let mut channel_ids = Vec::with_capacity(live_streams.len());
        let mut channel_titles = Vec::with_capacity(live_streams.len());
        let mut thumbnail_urls = Vec::with_capacity(live_streams.len());
        let mut chat_ids = Vec::with_capacity(live_streams.len());
        let mut published = Vec::with_capacity(live_streams.len());
        let mut scheduled = Vec::with_capacity(live_streams.len());

        for ls in live_streams {
            ids.push(ls.id().to_string());
            titles.push(ls.title().to_string());
            channel_ids.push(ls.channel_id().to_string());
            channel_titles.push(ls.channel_title().to_string());
            thumbnail_urls.push(ls.thumbnail_url().to_string());
            chat_ids.push(ls.chat_id().to_string());
            published.push(ls.published_at());
            scheduled.push(ls.scheduled_start());
        }

        sqlx::query(
            r#"
            INSERT INTO live_streams
                (id, title, channel_id, channel_title, thumbnail_url, chat_id,
                 published_at, scheduled_start)
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::text[], $5::text[],
                $6::text[], $7::timestamptz[], $8::timestamptz[])
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(&titles)
        .bind(&channel_ids)
        .bind(&channel_titles)
        .bind(&thumbnail_urls)
        .bind(&chat_ids)
        .bind(&published)
        .bind(&scheduled)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

/// JSON payload of a `live_stream.found` event.
pub fn found_event_payload(ls: &LiveStream) -> serde_json::Value {
    serde_json::json!({
        "videoId": ls.id(),
        "channelId": ls.channel_id(),
        "chatId": ls.chat_id(),
        "title": ls.title(),
        "thumbnailUrl": ls.thumbnail_url(),
        "publishedAt": ls.published_at(),
        "scheduledStart": ls.scheduled_start(),
    })
}

#[async_trait]
impl StreamStore for PgStreamStore {
    async fn existing(&self, ids: &[String]) -> FinderResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM live_streams WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn persist(&self, live_streams: &[LiveStream]) -> FinderResult<()> {
        let mut events = Vec::with_capacity(live_streams.len());
        for ls in live_streams {
            let payload = serde_json::to_vec(&found_event_payload(ls))
                .map_err(|e| anyhow::anyhow!("marshal event payload: {e}"))?;

            events.push(OutboxEvent::new(self.topic.clone(), ls.id(), payload));
        }

        let mut tx = self.pool.begin().await?;
        Self::insert_streams(&mut tx, live_streams).await?;
        self.outbox.insert(&mut tx, &events).await?;
        tx.commit().await?;

        debug!(count = live_streams.len(), "live streams persisted");

        Ok(())
    }
}
