use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::assets::metadata::MetadataStore;

const DAILY_COUNTER_TTL_SECS: i64 = 24 * 60 * 60;

/// Counter store seam. Production is Redis `INCR`/`EXPIRE`; tests use an
/// in-memory map.
#[async_trait]
pub trait RateCounter: Send + Sync {
    /// Atomically increments and returns the post-increment value.
    async fn incr(&self, key: &str) -> Result<i64>;

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;
}

pub struct RedisRateCounter {
    client: redis::Client,
}

impl RedisRateCounter {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RateCounter for RedisRateCounter {
    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.incr(key, 1).await?)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.expire(key, seconds).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.get(key).await?)
    }
}

pub fn daily_upload_key(user_id: Uuid, day: NaiveDate) -> String {
    format!("rate:upload:day:{user_id}:{}", day.format("%Y%m%d"))
}

/// Gate-keeps the upload pipeline: per-user asset count plus a per-day
/// upload counter. No retries here; store failures surface to the caller.
pub struct QuotaGuard {
    rate: Arc<dyn RateCounter>,
    metadata: Arc<dyn MetadataStore>,
}

impl QuotaGuard {
    pub fn new(rate: Arc<dyn RateCounter>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { rate, metadata }
    }

    /// Current committed asset count for the user. The caller compares this
    /// against its configured maximum.
    pub async fn check_asset_count(&self, user_id: Uuid) -> Result<i64> {
        self.metadata.count_by_user(user_id).await
    }

    /// Increments today's upload counter and returns the post-increment
    /// value. The increment stands even if the caller then rejects the
    /// attempt: a rejected upload still consumes one unit of daily quota.
    pub async fn increment_daily_upload(&self, user_id: Uuid, day: NaiveDate) -> Result<i64> {
        let key = daily_upload_key(user_id, day);
        let count = self.rate.incr(&key).await?;

        if count == 1 {
            // First upload of the day. A crash between INCR and EXPIRE can
            // leave the counter without a TTL; tomorrow's key self-heals.
            self.rate.expire(&key, DAILY_COUNTER_TTL_SECS).await?;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryMetadataStore, MemoryRateCounter};

    fn guard(rate: Arc<MemoryRateCounter>) -> QuotaGuard {
        QuotaGuard::new(rate, Arc::new(MemoryMetadataStore::default()))
    }

    #[tokio::test]
    async fn counter_increments_per_call() {
        let rate = Arc::new(MemoryRateCounter::default());
        let guard = guard(rate.clone());
        let user = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

        assert_eq!(guard.increment_daily_upload(user, day).await.unwrap(), 1);
        assert_eq!(guard.increment_daily_upload(user, day).await.unwrap(), 2);
        assert_eq!(guard.increment_daily_upload(user, day).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn ttl_set_only_on_first_increment() {
        let rate = Arc::new(MemoryRateCounter::default());
        let guard = guard(rate.clone());
        let user = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let key = daily_upload_key(user, day);

        guard.increment_daily_upload(user, day).await.unwrap();
        guard.increment_daily_upload(user, day).await.unwrap();

        assert_eq!(rate.expire_calls(&key), 1);
        assert_eq!(rate.ttl(&key), Some(DAILY_COUNTER_TTL_SECS));
        assert_eq!(rate.get(&key).await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn counters_are_scoped_per_user_and_day() {
        let rate = Arc::new(MemoryRateCounter::default());
        let guard = guard(rate.clone());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let monday = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 17).unwrap();

        guard.increment_daily_upload(alice, monday).await.unwrap();
        guard.increment_daily_upload(alice, monday).await.unwrap();

        assert_eq!(guard.increment_daily_upload(bob, monday).await.unwrap(), 1);
        assert_eq!(guard.increment_daily_upload(alice, tuesday).await.unwrap(), 1);
    }
}
