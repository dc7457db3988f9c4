use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::Ban;
use crate::engine::BanRepository;

pub struct PgBanRepository {
    pool: PgPool,
}

impl PgBanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BanRepository for PgBanRepository {
    async fn insert(&self, bans: &[Ban]) -> anyhow::Result<()> {
        if bans.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(bans.len());
        let mut author_ids = Vec::with_capacity(bans.len());
        let mut video_ids = Vec::with_capacity(bans.len());
        let mut ban_types = Vec::with_capacity(bans.len());
        let mut durations = Vec::with_capacity(bans.len());
        let mut published = Vec::with_capacity(bans.len());

        for ban in bans {
            ids.push(ban.id().to_string());
            author_ids.push(ban.author_id().to_string());
            video_ids.push(ban.video_id().to_string());
            ban_types.push(ban.ban_type().as_str().to_string());
            durations.push(ban.duration().as_secs() as i64);
            published.push(ban.published_at());
        }

        sqlx::query(
            r#"
            INSERT INTO bans (id, author_id, video_id, ban_type, duration_seconds, published_at)
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::text[], $5::bigint[],
                $6::timestamptz[])
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(&author_ids)
        .bind(&video_ids)
        .bind(&ban_types)
        .bind(&durations)
        .bind(&published)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
