use async_trait::async_trait;
use redis_lock::RedisLocker;

use crate::engine::Locker;

#[async_trait]
impl Locker for RedisLocker {
    async fn lock(&self, key: &str) -> anyhow::Result<bool> {
        Ok(RedisLocker::lock(self, key).await?)
    }

    async fn release(&self, key: &str) -> anyhow::Result<()> {
        Ok(RedisLocker::release(self, key).await?)
    }
}
