use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::TextMessage;
use crate::engine::TextMessageRepository;

pub struct PgTextMessageRepository {
    pool: PgPool,
}

impl PgTextMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TextMessageRepository for PgTextMessageRepository {
    async fn insert(&self, messages: &[TextMessage]) -> anyhow::Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(messages.len());
        let mut video_ids = Vec::with_capacity(messages.len());
        let mut author_ids = Vec::with_capacity(messages.len());
        let mut texts = Vec::with_capacity(messages.len());
        let mut published = Vec::with_capacity(messages.len());

        for tm in messages {
            ids.push(tm.id().to_string());
            video_ids.push(tm.video_id().to_string());
            author_ids.push(tm.author_id().to_string());
            texts.push(tm.text().to_string());
            published.push(tm.published_at());
        }

        sqlx::query(
            r#"
            INSERT INTO texts (id, video_id, author_id, text, published_at)
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::text[], $5::timestamptz[])
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(&video_ids)
        .bind(&author_ids)
        .bind(&texts)
        .bind(&published)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
