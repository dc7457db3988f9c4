use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::Author;
use crate::engine::AuthorRepository;

pub struct PgAuthorRepository {
    pool: PgPool,
}

impl PgAuthorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorRepository for PgAuthorRepository {
    async fn upsert(&self, authors: &[Author]) -> anyhow::Result<()> {
        if authors.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(authors.len());
        let mut names = Vec::with_capacity(authors.len());
        let mut image_urls = Vec::with_capacity(authors.len());
        let mut verified = Vec::with_capacity(authors.len());

        for author in authors {
            ids.push(author.id().to_string());
            names.push(author.name().to_string());
            image_urls.push(author.profile_image_url().to_string());
            verified.push(author.is_verified());
        }

        sqlx::query(
            r#"
            INSERT INTO authors (id, name, profile_image_url, is_verified, updated_at)
            SELECT id, name, profile_image_url, is_verified, NOW()
            FROM UNNEST($1::text[], $2::text[], $3::text[], $4::boolean[])
                AS t(id, name, profile_image_url, is_verified)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                profile_image_url = EXCLUDED.profile_image_url,
                is_verified = EXCLUDED.is_verified,
                updated_at = NOW()
            "#,
        )
        .bind(&ids)
        .bind(&names)
        .bind(&image_urls)
        .bind(&verified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
