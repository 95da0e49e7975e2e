use chrono::Utc;
use fund_core::{
    ComparisonCacheEntry, ComparisonCacheStore, ComparisonError, EnhancedComparisonResult, FundAnalysis,
    FundRecord, MarketCycle, MarketCycleProvider, MarketTiming, StabilityRecord,
};
use fund_scoring::{
    analyze_recent_performance, calculate_expense_score, calculate_portfolio_score, get_market_cycle_weight,
    get_recommendation, CompositeWeights,
};
use stable_comparison::{StabilityScore, StableFundComparison};
use std::collections::HashSet;
use std::sync::Arc;

pub mod config;
pub mod recommendation;

pub use config::ComparisonConfig;
pub use recommendation::{generate_enhanced_reasoning, generate_market_aware_recommendation};

/// Fewer funds than this yields no result
pub const MIN_FUNDS: usize = 2;
pub const MAX_FUNDS: usize = 5;

/// Orchestrates a fund comparison: cache lookup, market-cycle lookup,
/// per-fund scoring, caching and recommendation text.
pub struct FundComparisonLogic {
    market_cycle: Arc<dyn MarketCycleProvider>,
    stable: StableFundComparison,
    weights: CompositeWeights,
}

impl FundComparisonLogic {
    pub fn new(market_cycle: Arc<dyn MarketCycleProvider>, store: Arc<dyn ComparisonCacheStore>) -> Self {
        Self {
            market_cycle,
            stable: StableFundComparison::new(store),
            weights: CompositeWeights::STANDARD,
        }
    }

    /// Apply the cache namespace and window from `config`
    pub fn from_config(
        config: &ComparisonConfig,
        market_cycle: Arc<dyn MarketCycleProvider>,
        store: Arc<dyn ComparisonCacheStore>,
    ) -> Self {
        Self {
            market_cycle,
            stable: StableFundComparison::new(store)
                .with_namespace(config.cache_namespace.clone())
                .with_window(config.cache_window()),
            weights: CompositeWeights::STANDARD,
        }
    }

    /// Public accessor for the stability layer
    pub fn stable(&self) -> &StableFundComparison {
        &self.stable
    }

    /// Compare 2-5 funds, reusing a cached comparison of the same fund set
    /// while it is still valid. Returns `Ok(None)` for fewer than two funds.
    pub async fn compare_funds(&self, funds: &[FundRecord]) -> Result<Option<EnhancedComparisonResult>, ComparisonError> {
        self.compare(funds, true).await
    }

    /// Like `compare_funds` but always runs a fresh analysis. The cache is
    /// still overwritten with the new result.
    pub async fn compare_funds_fresh(
        &self,
        funds: &[FundRecord],
    ) -> Result<Option<EnhancedComparisonResult>, ComparisonError> {
        self.compare(funds, false).await
    }

    /// Force the next comparison of this fund set to recompute
    pub async fn invalidate(&self, funds: &[FundRecord]) -> Result<(), ComparisonError> {
        let ids: Vec<&str> = funds.iter().map(|f| f.scheme_code.as_str()).collect();
        self.stable.invalidate(&ids).await
    }

    async fn compare(
        &self,
        funds: &[FundRecord],
        use_cache: bool,
    ) -> Result<Option<EnhancedComparisonResult>, ComparisonError> {
        if funds.len() < MIN_FUNDS {
            tracing::info!("Comparison needs at least {} funds, got {}", MIN_FUNDS, funds.len());
            return Ok(None);
        }
        if funds.len() > MAX_FUNDS {
            return Err(ComparisonError::InvalidInput(format!(
                "at most {} funds can be compared, got {}",
                MAX_FUNDS,
                funds.len()
            )));
        }

        let ids: Vec<&str> = funds.iter().map(|f| f.scheme_code.as_str()).collect();
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ComparisonError::InvalidInput(format!(
                "fund {} appears more than once",
                duplicate
            )));
        }

        if use_cache {
            if let Some(entry) = self.stable.get_stable_comparison(&ids).await? {
                match self.result_from_cache(funds, &entry) {
                    Some(result) => {
                        tracing::info!("Serving stable comparison {} (best: {})", entry.key, result.best_fund);
                        return Ok(Some(result));
                    }
                    None => tracing::warn!("Cached comparison {} is missing funds, recomputing", entry.key),
                }
            }
        }

        tracing::info!("Starting fresh comparison of {} funds: {}", funds.len(), ids.join(", "));

        let cycle = self.market_cycle.current_market_cycle().await?;

        let (analyses, scores): (Vec<FundAnalysis>, Vec<StabilityScore>) =
            funds.iter().map(|fund| self.score_fund(fund, &cycle)).unzip();
        let best_idx = best_index(&analyses);
        let best = &analyses[best_idx];
        let (best_fund, best_fund_code, best_score) =
            (best.name.clone(), best.scheme_code.clone(), best.market_adjusted_score);

        let now = Utc::now();
        let next_review = scores[best_idx].next_review;
        let advice = self.stable.generate_market_timing_advice(&cycle);
        let market_timing = MarketTiming {
            phase: cycle.phase,
            allocation: cycle.allocation,
            confidence: f64::from(cycle.confidence),
            advice: advice.clone(),
            next_review,
        };

        let average_confidence = analyses.iter().map(|a| a.confidence).sum::<f64>() / analyses.len() as f64;
        let records: Vec<StabilityRecord> = analyses
            .iter()
            .zip(&scores)
            .map(|(a, score)| StabilityRecord::from_analysis(a, now, score.next_review))
            .collect();

        let entry = self
            .stable
            .save_stable_comparison(&ids, records, market_timing.clone(), advice, average_confidence)
            .await?;

        let reasoning = generate_enhanced_reasoning(&analyses, best, &cycle);
        let recommendation = generate_market_aware_recommendation(funds, &cycle);

        tracing::info!(
            "Comparison complete: best {} ({:.2}) in {} phase",
            best_fund,
            best_score,
            cycle.phase
        );

        Ok(Some(EnhancedComparisonResult {
            best_fund,
            best_fund_code,
            best_score,
            analyses,
            reasoning,
            recommendation,
            market_timing,
            is_stable_result: false,
            valid_until: entry.valid_until,
        }))
    }

    /// Score a single fund against the current market cycle
    pub fn analyze_fund(&self, fund: &FundRecord, cycle: &MarketCycle) -> FundAnalysis {
        self.score_fund(fund, cycle).0
    }

    fn score_fund(&self, fund: &FundRecord, cycle: &MarketCycle) -> (FundAnalysis, StabilityScore) {
        let performance = analyze_recent_performance(&fund.returns);
        let portfolio_score = calculate_portfolio_score(fund);
        let expense_score = calculate_expense_score(fund);
        let cycle_weight = get_market_cycle_weight(&fund.category, cycle.phase);

        let base_ai_score =
            self.weights
                .composite_score(portfolio_score, performance.momentum_score, expense_score, cycle_weight);
        let stability = self.stable.calculate_stability_score(base_ai_score, &fund.category, cycle);

        let missing = fund.missing_fields();
        if !missing.is_empty() {
            tracing::warn!(
                "Scoring {} ({}) with neutral defaults for: {}",
                fund.name,
                fund.scheme_code,
                missing.join(", ")
            );
        }

        tracing::debug!(
            "{}: portfolio={:.1} momentum={:.1} expense={:.1} weight={:.2} base={:.2} adjusted={:.2}",
            fund.scheme_code,
            portfolio_score,
            performance.momentum_score,
            expense_score,
            cycle_weight,
            base_ai_score,
            stability.market_adjusted_score
        );

        let analysis = FundAnalysis {
            scheme_code: fund.scheme_code.clone(),
            name: fund.name.clone(),
            category: fund.category.clone(),
            portfolio_score,
            recent_performance_score: performance.momentum_score,
            expense_score,
            market_fit_score: (5.0 * cycle_weight).clamp(0.0, 10.0),
            base_ai_score: stability.base_score,
            market_adjusted_score: stability.market_adjusted_score,
            confidence: stability.confidence,
            recommendation: get_recommendation(stability.market_adjusted_score),
            recent_trend: performance.recent_trend,
            insight: performance.insight,
            degraded: !missing.is_empty(),
        };

        (analysis, stability)
    }

    /// Rebuild a result from a cached entry, in the caller's fund order.
    /// `None` when the entry lacks a record for any requested fund.
    fn result_from_cache(&self, funds: &[FundRecord], entry: &ComparisonCacheEntry) -> Option<EnhancedComparisonResult> {
        let now = Utc::now();

        let analyses = funds
            .iter()
            .map(|fund| {
                entry
                    .record_for(&fund.scheme_code)
                    .map(|record| FundAnalysis::from_record(record, entry.decayed_confidence(record.confidence, now)))
            })
            .collect::<Option<Vec<_>>>()?;

        let best = &analyses[best_index(&analyses)];
        let phase = entry.market_timing.phase;

        let mut market_timing = entry.market_timing.clone();
        market_timing.confidence = entry.decayed_confidence(market_timing.confidence, now);

        Some(EnhancedComparisonResult {
            best_fund: best.name.clone(),
            best_fund_code: best.scheme_code.clone(),
            best_score: best.market_adjusted_score,
            reasoning: recommendation::reasoning_for_phase(&analyses, best, phase),
            recommendation: recommendation::recommendation_for_phase(funds, phase, &market_timing.allocation),
            analyses,
            market_timing,
            is_stable_result: true,
            valid_until: entry.valid_until,
        })
    }
}

/// Index of the highest market-adjusted score; the earliest fund wins ties
fn best_index(analyses: &[FundAnalysis]) -> usize {
    let mut best = 0;
    for (i, analysis) in analyses.iter().enumerate().skip(1) {
        if analysis.market_adjusted_score > analyses[best].market_adjusted_score {
            best = i;
        }
    }
    best
}
