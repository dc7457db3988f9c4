//! Lease-based distributed locking on Redis.
//!
//! A lock is a single key written with `SET NX PX`, so acquisition is atomic
//! and the lease self-expires if the holder crashes. Release is a plain `DEL`.
//! This gives best-effort mutual exclusion across a worker fleet:
//!
//! - at most one concurrent `lock` call on the same key observes `true`;
//! - a crashed holder stalls the key for at most the lease TTL;
//! - `release` on a key that is not held is not an error.
//!
//! The lock is advisory. Writers behind it must stay idempotent, since a
//! lease can expire while its holder is still running.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ExistenceCheck, SetExpiry, SetOptions};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Connect to Redis and wrap the connection manager for shared use.
pub async fn connect(redis_url: &str) -> Result<SharedConnectionManager, LockError> {
    let client = Client::open(redis_url).map_err(LockError::Redis)?;
    let manager = ConnectionManager::new(client)
        .await
        .map_err(LockError::Redis)?;

    Ok(Arc::new(Mutex::new(manager)))
}

pub type LockResult<T> = Result<T, LockError>;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("lease ttl must be between {min:?} and {max:?}, got {got:?}")]
    InvalidTtl {
        min: Duration,
        max: Duration,
        got: Duration,
    },
}

const MIN_TTL: Duration = Duration::from_secs(1);
const MAX_TTL: Duration = Duration::from_secs(60);

/// Default lease duration. Long enough to cover one poll cycle of a typical
/// holder, short enough that a crashed holder does not stall the fleet.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Redis-backed lock with a fixed lease TTL.
#[derive(Clone)]
pub struct RedisLocker {
    redis: SharedConnectionManager,
    ttl: Duration,
}

fn validate_ttl(ttl: Duration) -> LockResult<()> {
    if ttl < MIN_TTL || ttl > MAX_TTL {
        return Err(LockError::InvalidTtl {
            min: MIN_TTL,
            max: MAX_TTL,
            got: ttl,
        });
    }

    Ok(())
}

impl RedisLocker {
    pub fn new(redis: SharedConnectionManager, ttl: Duration) -> LockResult<Self> {
        validate_ttl(ttl)?;

        Ok(Self { redis, ttl })
    }

    /// Try to acquire the lease for `key`. Returns `false` without blocking
    /// if the key is already held by anyone, including this process.
    pub async fn lock(&self, key: &str) -> LockResult<bool> {
        let mut conn = self.redis.lock().await.clone();

        let was_set: bool = conn
            .set_options(
                key,
                1u8,
                SetOptions::default()
                    .conditional_set(ExistenceCheck::NX)
                    .with_expiration(SetExpiry::PX(self.ttl.as_millis() as usize)),
            )
            .await?;

        debug!(key, acquired = was_set, "lock attempt");

        Ok(was_set)
    }

    /// Drop the lease for `key`. Releasing a key that is not held succeeds.
    pub async fn release(&self, key: &str) -> LockResult<()> {
        let mut conn = self.redis.lock().await.clone();

        let deleted: u64 = conn.del(key).await?;
        debug!(key, deleted, "lock released");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn locker(ttl: Duration) -> RedisLocker {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let manager = connect(&redis_url).await.expect("connect to redis");

        RedisLocker::new(manager, ttl).expect("create locker")
    }

    #[test]
    fn rejects_out_of_bounds_ttl() {
        assert!(matches!(
            validate_ttl(Duration::from_millis(10)),
            Err(LockError::InvalidTtl { .. })
        ));
        assert!(matches!(
            validate_ttl(Duration::from_secs(120)),
            Err(LockError::InvalidTtl { .. })
        ));
        assert!(validate_ttl(DEFAULT_TTL).is_ok());
        assert!(validate_ttl(Duration::from_secs(60)).is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn lock_is_exclusive_until_released() {
        let locker = locker(DEFAULT_TTL).await;
        let key = format!("locks:test:{}", uuid::Uuid::new_v4());

        assert!(locker.lock(&key).await.unwrap());
        assert!(!locker.lock(&key).await.unwrap());

        locker.release(&key).await.unwrap();
        assert!(locker.lock(&key).await.unwrap());

        locker.release(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn concurrent_lock_admits_exactly_one() {
        let locker = locker(DEFAULT_TTL).await;
        let key = format!("locks:test:{}", uuid::Uuid::new_v4());

        let (a, b) = tokio::join!(locker.lock(&key), locker.lock(&key));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a, b);
        assert!(a || b);

        locker.release(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn lease_expires_without_release() {
        let locker = locker(Duration::from_secs(1)).await;
        let key = format!("locks:test:{}", uuid::Uuid::new_v4());

        assert!(locker.lock(&key).await.unwrap());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(locker.lock(&key).await.unwrap());

        locker.release(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn release_unheld_key_is_ok() {
        let locker = locker(DEFAULT_TTL).await;
        let key = format!("locks:test:{}", uuid::Uuid::new_v4());

        locker.release(&key).await.unwrap();
    }
}
