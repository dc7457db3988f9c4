use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::LiveStreamProgress;
use crate::engine::ProgressRepository;
use crate::kafka::ProgressStore;

pub struct PgProgressRepository {
    pool: PgPool,
}

impl PgProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn progress_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<LiveStreamProgress> {
    let id: String = row.try_get("id")?;
    let chat_id: String = row.try_get("chat_id")?;
    let scheduled_start: DateTime<Utc> = row.try_get("scheduled_start")?;
    let next_page_token: Option<String> = row.try_get("next_page_token")?;
    let finished_at: Option<DateTime<Utc>> = row.try_get("finished_at")?;
    let finish_reason: Option<String> = row.try_get("finish_reason")?;

    let mut lsp = LiveStreamProgress::new(id, chat_id, scheduled_start)?;

    if let Some(token) = next_page_token {
        lsp.set_next_page_token(token);
    }

    if let (Some(at), Some(reason)) = (finished_at, finish_reason) {
        lsp.finish(at, reason);
    }

    Ok(lsp)
}

#[async_trait]
impl ProgressRepository for PgProgressRepository {
    async fn upsert(&self, lsp: &LiveStreamProgress) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO live_stream_progress
                (id, chat_id, scheduled_start, next_page_token, finished_at, finish_reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                chat_id = EXCLUDED.chat_id,
                scheduled_start = EXCLUDED.scheduled_start,
                next_page_token = EXCLUDED.next_page_token,
                finished_at = EXCLUDED.finished_at,
                finish_reason = EXCLUDED.finish_reason
            "#,
        )
        .bind(lsp.id())
        .bind(lsp.chat_id())
        .bind(lsp.scheduled_start())
        .bind(lsp.next_page_token())
        .bind(lsp.finished_at())
        .bind(if lsp.finish_reason().is_empty() {
            None
        } else {
            Some(lsp.finish_reason())
        })
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn started(&self, starts_within: Duration) -> anyhow::Result<Vec<LiveStreamProgress>> {
        let threshold = Utc::now() + chrono::Duration::from_std(starts_within)?;

        let rows = sqlx::query(
            r#"
            SELECT id, chat_id, scheduled_start, next_page_token, finished_at, finish_reason
            FROM live_stream_progress
            WHERE finished_at IS NULL AND scheduled_start <= $1
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(progress_from_row).collect()
    }
}

#[async_trait]
impl ProgressStore for PgProgressRepository {
    async fn insert(&self, lsp: &LiveStreamProgress) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO live_stream_progress (id, chat_id, scheduled_start)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(lsp.id())
        .bind(lsp.chat_id())
        .bind(lsp.scheduled_start())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
