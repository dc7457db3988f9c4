//! Transactional outbox over PostgreSQL and Kafka.
//!
//! Domain writes and their outbound events are committed in one database
//! transaction; a relay later reads the unpublished rows, produces them to
//! Kafka with full-replica acknowledgement, and flips them to published.
//! A crash between the send and the flip causes redelivery, so consumers of
//! the published topics must be idempotent. Nothing is ever skipped: a row is
//! either still pending and resendable, or marked published after at least
//! one successful delivery.
//!
//! Insertion happens inside a caller-owned [`sqlx::Transaction`]:
//!
//! ```rust,no_run
//! use kafka_outbox::{OutboxEvent, OutboxStore, SqlxOutboxStore};
//! use sqlx::PgPool;
//!
//! async fn save(pool: &PgPool, store: &SqlxOutboxStore, event: OutboxEvent)
//!     -> anyhow::Result<()>
//! {
//!     let mut tx = pool.begin().await?;
//!     // ... domain inserts on &mut *tx ...
//!     store.insert(&mut tx, &[event]).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

mod error;

pub use error::{OutboxError, OutboxResult};

/// One outbound event, stored alongside the domain write that produced it.
///
/// `topic`, `key` and `payload` are produced to the broker verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub published: bool,
}

impl OutboxEvent {
    /// Build a pending event with a fresh id.
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            key: key.into(),
            payload,
            published: false,
        }
    }
}

/// Storage for outbox rows.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert events within the caller's transaction, so they commit or roll
    /// back together with the domain write.
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        events: &[OutboxEvent],
    ) -> OutboxResult<()>;

    /// All rows not yet marked published, in arbitrary order.
    async fn pending(&self) -> OutboxResult<Vec<OutboxEvent>>;

    /// Flip exactly the given rows to published, in one update.
    async fn mark_published(&self, ids: &[Uuid]) -> OutboxResult<()>;
}

/// sqlx implementation over the `outbox_events` table.
pub struct SqlxOutboxStore {
    pool: PgPool,
}

impl SqlxOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for SqlxOutboxStore {
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        events: &[OutboxEvent],
    ) -> OutboxResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(events.len());
        let mut topics = Vec::with_capacity(events.len());
        let mut keys = Vec::with_capacity(events.len());
        let mut payloads = Vec::with_capacity(events.len());

        for event in events {
            ids.push(event.id);
            topics.push(event.topic.clone());
            keys.push(event.key.clone());
            payloads.push(event.payload.clone());
        }

        sqlx::query(
            r#"
            INSERT INTO outbox_events (id, topic, key, payload, published)
            SELECT id, topic, key, payload, FALSE
            FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::bytea[])
                AS t(id, topic, key, payload)
            "#,
        )
        .bind(&ids)
        .bind(&topics)
        .bind(&keys)
        .bind(&payloads)
        .execute(&mut **tx)
        .await?;

        debug!(count = events.len(), "events inserted into outbox");

        Ok(())
    }

    async fn pending(&self) -> OutboxResult<Vec<OutboxEvent>> {
        // `published` is nullable so rows written by hand or by older
        // producers still count as pending.
        let rows = sqlx::query(
            r#"
            SELECT id, topic, key, payload, published
            FROM outbox_events
            WHERE published IS NULL OR published = FALSE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let events = rows
            .into_iter()
            .map(|row| {
                Ok(OutboxEvent {
                    id: row.try_get("id")?,
                    topic: row.try_get("topic")?,
                    key: row.try_get("key")?,
                    payload: row.try_get("payload")?,
                    published: row.try_get::<Option<bool>, _>("published")?.unwrap_or(false),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!(count = events.len(), "fetched pending outbox events");

        Ok(events)
    }

    async fn mark_published(&self, ids: &[Uuid]) -> OutboxResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE outbox_events
            SET published = TRUE
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Broker-side publisher of single events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()>;
}

/// Kafka implementation of [`EventPublisher`].
///
/// The producer must be configured with `acks=all` and
/// `enable.idempotence=true`; every send awaits the broker acknowledgement.
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaEventPublisher {
    pub fn new(producer: FutureProducer) -> Self {
        Self {
            producer,
            delivery_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()> {
        let record = FutureRecord::to(&event.topic)
            .key(&event.key)
            .payload(&event.payload);

        self.producer
            .send(record, self.delivery_timeout)
            .await
            .map_err(|(err, _)| OutboxError::PublishFailed(err.to_string()))?;

        debug!(event_id = %event.id, topic = %event.topic, key = %event.key, "event published");

        Ok(())
    }
}

/// Bridges the outbox table to the broker.
pub struct OutboxRelay<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
}

impl<S: OutboxStore, P: EventPublisher> OutboxRelay<S, P> {
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        Self { store, publisher }
    }

    /// Publish every pending row, then mark the sent rows published in one
    /// update. Any publish failure fails the whole call before anything is
    /// marked; the next call resends the full pending set.
    pub async fn publish_pending(&self) -> OutboxResult<()> {
        let events = self.store.pending().await?;

        if events.is_empty() {
            return Ok(());
        }

        for event in &events {
            self.publisher.publish(event).await?;
        }

        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        self.store.mark_published(&ids).await?;

        info!(count = events.len(), "published pending outbox events");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeStore {
        rows: Mutex<Vec<OutboxEvent>>,
        fail_mark: bool,
    }

    impl FakeStore {
        fn with_rows(rows: Vec<OutboxEvent>) -> Self {
            Self {
                rows: Mutex::new(rows),
                fail_mark: false,
            }
        }

        fn published_ids(&self) -> Vec<Uuid> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.published)
                .map(|e| e.id)
                .collect()
        }
    }

    #[async_trait]
    impl OutboxStore for FakeStore {
        async fn insert(
            &self,
            _tx: &mut Transaction<'_, Postgres>,
            _events: &[OutboxEvent],
        ) -> OutboxResult<()> {
            unreachable!("relay never inserts")
        }

        async fn pending(&self) -> OutboxResult<Vec<OutboxEvent>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|e| !e.published)
                .cloned()
                .collect())
        }

        async fn mark_published(&self, ids: &[Uuid]) -> OutboxResult<()> {
            if self.fail_mark {
                return Err(OutboxError::PublishFailed("mark failed".into()));
            }

            for row in self.rows.lock().unwrap().iter_mut() {
                if ids.contains(&row.id) {
                    row.published = true;
                }
            }

            Ok(())
        }
    }

    struct FakePublisher {
        sent: Mutex<Vec<Uuid>>,
        fail_after: Option<usize>,
    }

    impl FakePublisher {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_after: None,
            }
        }

        fn failing_after(n: usize) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_after: Some(n),
            }
        }
    }

    #[async_trait]
    impl EventPublisher for FakePublisher {
        async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()> {
            let mut sent = self.sent.lock().unwrap();
            if let Some(limit) = self.fail_after {
                if sent.len() >= limit {
                    return Err(OutboxError::PublishFailed("broker down".into()));
                }
            }
            sent.push(event.id);

            Ok(())
        }
    }

    fn event(topic: &str, key: &str) -> OutboxEvent {
        OutboxEvent::new(topic, key, format!("{{\"videoId\":\"{key}\"}}").into_bytes())
    }

    #[tokio::test]
    async fn empty_outbox_is_a_no_op() {
        let store = Arc::new(FakeStore::with_rows(vec![]));
        let publisher = Arc::new(FakePublisher::new());
        let relay = OutboxRelay::new(store.clone(), publisher.clone());

        relay.publish_pending().await.unwrap();

        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publishes_and_marks_exactly_the_pending_rows() {
        let mut already = event("live_stream.found.v1", "v0");
        already.published = true;
        let a = event("live_stream.found.v1", "v1");
        let b = event("live_stream.found.v1", "v2");

        let store = Arc::new(FakeStore::with_rows(vec![already.clone(), a.clone(), b.clone()]));
        let publisher = Arc::new(FakePublisher::new());
        let relay = OutboxRelay::new(store.clone(), publisher.clone());

        relay.publish_pending().await.unwrap();

        let sent = publisher.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![a.id, b.id]);

        let mut published = store.published_ids();
        published.sort();
        let mut expected = vec![already.id, a.id, b.id];
        expected.sort();
        assert_eq!(published, expected);
    }

    #[tokio::test]
    async fn publish_failure_marks_nothing() {
        let a = event("live_stream.found.v1", "v1");
        let b = event("live_stream.found.v1", "v2");

        let store = Arc::new(FakeStore::with_rows(vec![a.clone(), b]));
        let publisher = Arc::new(FakePublisher::failing_after(1));
        let relay = OutboxRelay::new(store.clone(), publisher.clone());

        assert!(relay.publish_pending().await.is_err());

        assert_eq!(publisher.sent.lock().unwrap().clone(), vec![a.id]);
        assert!(store.published_ids().is_empty());
    }

    #[tokio::test]
    async fn crash_between_send_and_mark_redelivers() {
        let a = event("live_stream.found.v1", "v1");

        // First relay sends but dies before marking.
        let store = Arc::new(FakeStore {
            rows: Mutex::new(vec![a.clone()]),
            fail_mark: true,
        });
        let publisher = Arc::new(FakePublisher::new());
        let relay = OutboxRelay::new(store.clone(), publisher.clone());
        assert!(relay.publish_pending().await.is_err());
        assert_eq!(publisher.sent.lock().unwrap().clone(), vec![a.id]);

        // Restarted relay sees the row still pending and resends it.
        let rows = store.rows.lock().unwrap().clone();
        let store = Arc::new(FakeStore::with_rows(rows));
        let relay = OutboxRelay::new(store.clone(), publisher.clone());
        relay.publish_pending().await.unwrap();

        assert_eq!(publisher.sent.lock().unwrap().clone(), vec![a.id, a.id]);
        assert_eq!(store.published_ids(), vec![a.id]);
    }
}
