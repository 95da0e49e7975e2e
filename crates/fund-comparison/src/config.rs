use anyhow::{ensure, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// How long a cached comparison stays valid
    pub cache_window_days: i64,
    /// Prefix of comparison cache keys
    pub cache_namespace: String,
    /// Redis connection string; in-memory cache when unset
    pub redis_url: Option<String>,
    /// JSON endpoint serving the market indicator snapshot
    pub market_indicators_url: Option<String>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            cache_window_days: 7,
            cache_namespace: stable_comparison::DEFAULT_NAMESPACE.to_string(),
            redis_url: None,
            market_indicators_url: None,
        }
    }
}

impl ComparisonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup (environment, map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            cache_window_days: match non_empty("COMPARISON_CACHE_WINDOW_DAYS") {
                Some(v) => v
                    .trim()
                    .parse()
                    .with_context(|| format!("COMPARISON_CACHE_WINDOW_DAYS must be a whole number, got {:?}", v))?,
                None => defaults.cache_window_days,
            },
            cache_namespace: non_empty("COMPARISON_CACHE_NAMESPACE").unwrap_or(defaults.cache_namespace),
            redis_url: non_empty("REDIS_URL"),
            market_indicators_url: non_empty("MARKET_INDICATORS_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.cache_window_days > 0,
            "cache window must be at least one day (got {})",
            self.cache_window_days
        );
        ensure!(!self.cache_namespace.trim().is_empty(), "cache namespace must not be empty");
        Ok(())
    }

    pub fn cache_window(&self) -> Duration {
        Duration::days(self.cache_window_days)
    }
}
