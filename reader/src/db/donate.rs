use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::Donate;
use crate::engine::DonateRepository;

pub struct PgDonateRepository {
    pool: PgPool,
}

impl PgDonateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DonateRepository for PgDonateRepository {
    async fn insert(&self, donates: &[Donate]) -> anyhow::Result<()> {
        if donates.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(donates.len());
        let mut author_ids = Vec::with_capacity(donates.len());
        let mut video_ids = Vec::with_capacity(donates.len());
        let mut comments = Vec::with_capacity(donates.len());
        let mut amounts = Vec::with_capacity(donates.len());
        let mut amount_micros = Vec::with_capacity(donates.len());
        let mut currencies = Vec::with_capacity(donates.len());
        let mut published = Vec::with_capacity(donates.len());

        for donate in donates {
            ids.push(donate.id().to_string());
            author_ids.push(donate.author_id().to_string());
            video_ids.push(donate.video_id().to_string());
            comments.push(donate.comment().to_string());
            amounts.push(donate.amount().to_string());
            amount_micros.push(donate.amount_micros() as i64);
            currencies.push(donate.currency().to_string());
            published.push(donate.published_at());
        }

        sqlx::query(
            r#"
            INSERT INTO donates
                (id, author_id, video_id, comment, amount, amount_micros, currency, published_at)
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::text[], $5::text[],
                $6::bigint[], $7::text[], $8::timestamptz[])
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(&author_ids)
        .bind(&video_ids)
        .bind(&comments)
        .bind(&amounts)
        .bind(&amount_micros)
        .bind(&currencies)
        .bind(&published)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
