use async_trait::async_trait;
use dashmap::DashMap;
use fund_core::{ComparisonCacheEntry, ComparisonCacheStore, ComparisonError};

/// Process-local cache store
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, ComparisonCacheEntry>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ComparisonCacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<ComparisonCacheEntry>, ComparisonError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn set(&self, key: &str, entry: ComparisonCacheEntry) -> Result<(), ComparisonError> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ComparisonError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisCacheStore;

#[cfg(feature = "redis")]
mod redis_store {
    use super::*;
    use chrono::Utc;
    use redis::aio::ConnectionManager;
    use redis::AsyncCommands;

    fn cache_error(e: redis::RedisError) -> ComparisonError {
        ComparisonError::CacheUnavailable(e.to_string())
    }

    /// Redis-backed store. Entries are JSON values expiring with the entry.
    #[derive(Clone)]
    pub struct RedisCacheStore {
        manager: ConnectionManager,
    }

    impl RedisCacheStore {
        pub async fn connect(url: &str) -> Result<Self, ComparisonError> {
            let client = redis::Client::open(url).map_err(cache_error)?;
            let manager = ConnectionManager::new(client).await.map_err(cache_error)?;
            Ok(Self { manager })
        }
    }

    #[async_trait]
    impl ComparisonCacheStore for RedisCacheStore {
        async fn get(&self, key: &str) -> Result<Option<ComparisonCacheEntry>, ComparisonError> {
            let mut conn = self.manager.clone();
            let raw: Option<String> = conn.get(key).await.map_err(cache_error)?;

            raw.map(|payload| serde_json::from_str(&payload))
                .transpose()
                .map_err(ComparisonError::from)
        }

        async fn set(&self, key: &str, entry: ComparisonCacheEntry) -> Result<(), ComparisonError> {
            let ttl = (entry.valid_until - Utc::now()).num_seconds().max(1) as u64;
            let payload = serde_json::to_string(&entry)?;

            let mut conn = self.manager.clone();
            conn.set_ex::<_, _, ()>(key, payload, ttl).await.map_err(cache_error)
        }

        async fn delete(&self, key: &str) -> Result<(), ComparisonError> {
            let mut conn = self.manager.clone();
            conn.del::<_, ()>(key).await.map_err(cache_error)
        }
    }
}
