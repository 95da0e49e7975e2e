use async_trait::async_trait;
use crate::{ComparisonCacheEntry, ComparisonError, MarketCycle};

/// Key-value store holding comparison results keyed by fund set
#[async_trait]
pub trait ComparisonCacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ComparisonCacheEntry>, ComparisonError>;

    /// Replace the entry stored under `key` as a whole
    async fn set(&self, key: &str, entry: ComparisonCacheEntry) -> Result<(), ComparisonError>;

    async fn delete(&self, key: &str) -> Result<(), ComparisonError>;
}

/// Source of the current market regime snapshot
#[async_trait]
pub trait MarketCycleProvider: Send + Sync {
    async fn current_market_cycle(&self) -> Result<MarketCycle, ComparisonError>;
}
