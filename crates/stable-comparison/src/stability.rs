use chrono::{DateTime, Duration, Utc};
use fund_core::{
    ComparisonCacheEntry, ComparisonCacheStore, ComparisonError, FundCategory, MarketCycle, MarketPhase,
    MarketTiming, StabilityRecord,
};
use fund_scoring::get_market_cycle_weight;
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix of every comparison cache key
pub const DEFAULT_NAMESPACE: &str = "stable_fund_comparison";
const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Market-adjusted score of one fund for the current cache window
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityScore {
    pub base_score: f64,
    pub market_adjusted_score: f64,
    pub confidence: f64,
    pub next_review: DateTime<Utc>,
}

pub struct StableFundComparison {
    store: Arc<dyn ComparisonCacheStore>,
    namespace: String,
    window: Duration,
}

impl StableFundComparison {
    pub fn new(store: Arc<dyn ComparisonCacheStore>) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            window: Duration::days(DEFAULT_WINDOW_DAYS),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Override the cache window (how long a comparison stays valid)
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Cache key for a fund set. Order of `fund_ids` does not matter.
    pub fn cache_key<S: AsRef<str>>(&self, fund_ids: &[S]) -> String {
        let mut ids: Vec<&str> = fund_ids.iter().map(AsRef::as_ref).collect();
        ids.sort_unstable();
        format!("{}_{}", self.namespace, ids.join("_"))
    }

    /// Cached comparison for the fund set, `None` on a miss or once expired
    pub async fn get_stable_comparison<S: AsRef<str>>(
        &self,
        fund_ids: &[S],
    ) -> Result<Option<ComparisonCacheEntry>, ComparisonError> {
        let key = self.cache_key(fund_ids);
        let Some(entry) = self.store.get(&key).await? else {
            debug!("Comparison cache miss for {}", key);
            return Ok(None);
        };

        if !entry.is_valid_at(Utc::now()) {
            info!("Comparison cache entry {} expired at {}", key, entry.valid_until);
            return Ok(None);
        }

        debug!("Comparison cache hit for {} (valid until {})", key, entry.valid_until);
        Ok(Some(entry))
    }

    /// Scale a base score by the category weight for the current phase.
    ///
    /// Confidence is the regime confidence for every fund; there is no
    /// per-fund statistical adjustment.
    pub fn calculate_stability_score(
        &self,
        base_score: f64,
        category: &FundCategory,
        market_cycle: &MarketCycle,
    ) -> StabilityScore {
        let weight = get_market_cycle_weight(category, market_cycle.phase);

        StabilityScore {
            base_score,
            market_adjusted_score: (base_score * weight).clamp(0.0, 10.0),
            confidence: f64::from(market_cycle.confidence),
            next_review: Utc::now() + self.window,
        }
    }

    /// Store a new entry for the fund set, replacing any previous one
    pub async fn save_stable_comparison<S: AsRef<str>>(
        &self,
        fund_ids: &[S],
        stable_rankings: Vec<StabilityRecord>,
        market_timing: MarketTiming,
        market_context: String,
        average_confidence: f64,
    ) -> Result<ComparisonCacheEntry, ComparisonError> {
        let key = self.cache_key(fund_ids);
        let created_at = Utc::now();

        let entry = ComparisonCacheEntry {
            key: key.clone(),
            records: stable_rankings,
            market_context,
            average_confidence,
            market_timing,
            created_at,
            valid_until: created_at + self.window,
        };

        self.store.set(&key, entry.clone()).await?;
        info!("Saved stable comparison {} (valid until {})", key, entry.valid_until);

        Ok(entry)
    }

    /// Drop the cached comparison so the next request recomputes it
    pub async fn invalidate<S: AsRef<str>>(&self, fund_ids: &[S]) -> Result<(), ComparisonError> {
        let key = self.cache_key(fund_ids);
        self.store.delete(&key).await?;
        info!("Invalidated stable comparison {}", key);
        Ok(())
    }

    /// Guidance combining the phase with its suggested allocation
    pub fn generate_market_timing_advice(&self, market_cycle: &MarketCycle) -> String {
        let guidance = match market_cycle.phase {
            MarketPhase::Bottom => {
                "Valuations are depressed; stagger lump sums and lean into small and mid caps."
            }
            MarketPhase::Recovery => "Momentum is rebuilding; add equity exposure steadily through SIPs.",
            MarketPhase::Growth => {
                "Conditions favor staying invested; keep SIPs running and rebalance annually."
            }
            MarketPhase::Peak => {
                "Valuations are stretched; book partial profits and shift toward debt and large caps."
            }
            MarketPhase::Correction => {
                "Volatility is elevated; favor debt and quality large caps and deploy cash gradually."
            }
        };

        let a = &market_cycle.allocation;
        format!(
            "{} phase ({}/10 confidence, {} months in): {} Suggested allocation: {}% equity ({}% large / {}% mid / {}% small cap) and {}% debt. Next expected: {}.",
            market_cycle.phase.name(),
            market_cycle.confidence,
            market_cycle.months_in_phase,
            guidance,
            a.equity,
            a.large_cap,
            a.mid_cap,
            a.small_cap,
            a.debt,
            market_cycle.expected_next
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryCacheStore;
    use fund_core::{FundAnalysis, RecentTrend};
    use market_cycle::StaticMarketCycle;

    fn record(code: &str, adjusted: f64) -> StabilityRecord {
        let now = Utc::now();
        StabilityRecord {
            scheme_code: code.to_string(),
            name: format!("Fund {}", code),
            category: FundCategory::LargeCap,
            portfolio_score: 6.0,
            recent_performance_score: 5.0,
            expense_score: 8.0,
            market_fit_score: 5.0,
            recent_trend: RecentTrend::Stable,
            insight: String::new(),
            degraded: false,
            base_score: adjusted,
            market_adjusted_score: adjusted,
            confidence: 7.0,
            computed_at: now,
            next_review: now + Duration::days(7),
        }
    }

    fn records(codes: &[&str]) -> Vec<StabilityRecord> {
        codes.iter().map(|c| record(c, 6.0)).collect()
    }

    fn timing(cycle: &MarketCycle) -> MarketTiming {
        MarketTiming {
            phase: cycle.phase,
            allocation: cycle.allocation,
            confidence: f64::from(cycle.confidence),
            advice: String::new(),
            next_review: Utc::now() + Duration::days(7),
        }
    }

    fn comparison() -> (Arc<InMemoryCacheStore>, StableFundComparison) {
        let store = Arc::new(InMemoryCacheStore::new());
        let stable = StableFundComparison::new(store.clone());
        (store, stable)
    }

    #[test]
    fn test_cache_key_is_order_independent() {
        let (_, stable) = comparison();

        let forward = stable.cache_key(&["A", "B", "C"]);
        let shuffled = stable.cache_key(&["C", "A", "B"]);

        assert_eq!(forward, shuffled);
        assert_eq!(forward, "stable_fund_comparison_A_B_C");
    }

    #[test]
    fn test_cache_key_namespace() {
        let (store, _) = comparison();
        let stable = StableFundComparison::new(store).with_namespace("test");
        let ids = vec!["119551".to_string(), "100033".to_string()];

        assert_eq!(stable.cache_key(&ids), "test_100033_119551");
    }

    #[test]
    fn test_stability_score_applies_weight_and_clamps() {
        let (_, stable) = comparison();
        let bottom = StaticMarketCycle::for_phase(MarketPhase::Bottom, 6);

        let score = stable.calculate_stability_score(6.0, &FundCategory::SmallCap, bottom.cycle());
        assert!((score.market_adjusted_score - 7.8).abs() < 1e-9);
        assert_eq!(score.base_score, 6.0);
        assert_eq!(score.confidence, 6.0);
        assert!(score.next_review > Utc::now() + Duration::days(6));

        let capped = stable.calculate_stability_score(9.5, &FundCategory::SmallCap, bottom.cycle());
        assert_eq!(capped.market_adjusted_score, 10.0);
    }

    #[tokio::test]
    async fn test_save_then_get_in_any_order() {
        let (_, stable) = comparison();
        let cycle = StaticMarketCycle::for_phase(MarketPhase::Growth, 8);

        let saved = stable
            .save_stable_comparison(&["A", "B", "C"], records(&["A", "B", "C"]), timing(cycle.cycle()), "ctx".into(), 8.0)
            .await
            .unwrap();
        assert_eq!(saved.valid_until - saved.created_at, Duration::days(7));

        let hit = stable.get_stable_comparison(&["C", "A", "B"]).await.unwrap();
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().records.len(), 3);
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_returned() {
        let (store, stable) = comparison();
        let cycle = StaticMarketCycle::for_phase(MarketPhase::Growth, 8);

        let mut entry = stable
            .save_stable_comparison(&["A", "B"], records(&["A", "B"]), timing(cycle.cycle()), "ctx".into(), 8.0)
            .await
            .unwrap();
        entry.created_at = Utc::now() - Duration::days(8);
        entry.valid_until = Utc::now() - Duration::days(1);
        store.set(&entry.key, entry.clone()).await.unwrap();

        assert!(stable.get_stable_comparison(&["A", "B"]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let (store, stable) = comparison();
        let cycle = StaticMarketCycle::for_phase(MarketPhase::Peak, 5);

        stable
            .save_stable_comparison(&["A", "B"], records(&["A", "B"]), timing(cycle.cycle()), "ctx".into(), 5.0)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        stable.invalidate(&["B", "A"]).await.unwrap();
        assert!(store.is_empty());
        assert!(stable.get_stable_comparison(&["A", "B"]).await.unwrap().is_none());
    }

    #[test]
    fn test_market_timing_advice_is_deterministic() {
        let (_, stable) = comparison();
        let peak = StaticMarketCycle::for_phase(MarketPhase::Peak, 7);

        let first = stable.generate_market_timing_advice(peak.cycle());
        let second = stable.generate_market_timing_advice(peak.cycle());

        assert_eq!(first, second);
        assert!(first.starts_with("Peak phase (7/10 confidence"));
        assert!(first.contains("50% equity"));
        assert!(first.contains("Next expected: Correction"));
    }

    #[test]
    fn test_record_round_trip_keeps_component_scores() {
        let r = record("A", 7.2);
        let analysis = FundAnalysis::from_record(&r, 6.5);

        assert_eq!(analysis.market_adjusted_score, 7.2);
        assert_eq!(analysis.confidence, 6.5);
        assert_eq!(analysis.expense_score, 8.0);
        assert_eq!(analysis.recommendation, fund_core::Recommendation::Hold);
    }
}
