use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ComparisonError;

/// Fraction of its stored value a cached confidence keeps at expiry
pub const CONFIDENCE_DECAY_FLOOR: f64 = 0.7;

/// Mutual fund category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FundCategory {
    LargeCap,
    MidCap,
    SmallCap,
    Elss,
    Debt,
    Hybrid,
    Index,
    Other(String),
}

impl FundCategory {
    /// Classify a free-text category such as "Equity: Large Cap" or "Debt - Gilt"
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();

        if lower.contains("large cap") || lower.contains("largecap") {
            FundCategory::LargeCap
        } else if lower.contains("mid cap") || lower.contains("midcap") {
            FundCategory::MidCap
        } else if lower.contains("small cap") || lower.contains("smallcap") {
            FundCategory::SmallCap
        } else if lower.contains("elss") {
            FundCategory::Elss
        } else if ["debt", "bond", "liquid", "gilt"].iter().any(|k| lower.contains(k)) {
            FundCategory::Debt
        } else if lower.contains("hybrid") || lower.contains("balanced") {
            FundCategory::Hybrid
        } else if lower.contains("index") {
            FundCategory::Index
        } else {
            FundCategory::Other(label.trim().to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FundCategory::LargeCap => "Large Cap",
            FundCategory::MidCap => "Mid Cap",
            FundCategory::SmallCap => "Small Cap",
            FundCategory::Elss => "ELSS",
            FundCategory::Debt => "Debt",
            FundCategory::Hybrid => "Hybrid",
            FundCategory::Index => "Index",
            FundCategory::Other(label) => label.as_str(),
        }
    }
}

impl From<String> for FundCategory {
    fn from(label: String) -> Self {
        FundCategory::from_label(&label)
    }
}

impl From<FundCategory> for String {
    fn from(category: FundCategory) -> Self {
        category.label().to_string()
    }
}

impl fmt::Display for FundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trailing returns in percent. Unknown horizons are 0; NaN and infinite
/// values are treated as unknown too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingReturns {
    pub one_month: f64,
    pub two_month: f64,
    pub three_month: f64,
    pub six_month: f64,
    pub one_year: f64,
    pub three_year: f64,
    pub five_year: f64,
}

impl TrailingReturns {
    /// All horizons, shortest first
    pub fn horizons(&self) -> [f64; 7] {
        [
            self.one_month,
            self.two_month,
            self.three_month,
            self.six_month,
            self.one_year,
            self.three_year,
            self.five_year,
        ]
    }

    /// 1M, 2M and 3M returns
    pub fn short_term(&self) -> [f64; 3] {
        [self.one_month, self.two_month, self.three_month]
    }

    /// 6M, 1Y, 3Y and 5Y returns
    pub fn long_term(&self) -> [f64; 4] {
        [self.six_month, self.one_year, self.three_year, self.five_year]
    }

    pub fn is_empty(&self) -> bool {
        self.horizons().iter().all(|r| *r == 0.0 || !r.is_finite())
    }
}

/// A candidate fund under comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRecord {
    /// Scheme code, unique per fund
    pub scheme_code: String,
    pub name: String,
    pub category: FundCategory,
    #[serde(default)]
    pub nav: f64,
    #[serde(default)]
    pub returns: TrailingReturns,
    /// Expense ratio in percent
    #[serde(default)]
    pub expense_ratio: Option<f64>,
    /// Assets under management
    #[serde(default)]
    pub aum: f64,
}

impl FundRecord {
    pub fn new(scheme_code: impl Into<String>, name: impl Into<String>, category: FundCategory) -> Self {
        Self {
            scheme_code: scheme_code.into(),
            name: name.into(),
            category,
            nav: 0.0,
            returns: TrailingReturns::default(),
            expense_ratio: None,
            aum: 0.0,
        }
    }

    pub fn with_nav(mut self, nav: f64) -> Self {
        self.nav = nav;
        self
    }

    pub fn with_returns(mut self, returns: TrailingReturns) -> Self {
        self.returns = returns;
        self
    }

    pub fn with_expense_ratio(mut self, expense_ratio: f64) -> Self {
        self.expense_ratio = Some(expense_ratio);
        self
    }

    pub fn with_aum(mut self, aum: f64) -> Self {
        self.aum = aum;
        self
    }

    /// Names of the inputs that will be replaced by neutral defaults
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.returns.is_empty() {
            missing.push("returns");
        }
        if !self.expense_ratio.is_some_and(f64::is_finite) {
            missing.push("expense_ratio");
        }
        if !self.aum.is_finite() || self.aum <= 0.0 {
            missing.push("aum");
        }
        missing
    }
}

/// Market cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketPhase {
    Bottom,
    Recovery,
    Growth,
    Peak,
    Correction,
}

impl MarketPhase {
    pub const ALL: [MarketPhase; 5] = [
        MarketPhase::Bottom,
        MarketPhase::Recovery,
        MarketPhase::Growth,
        MarketPhase::Peak,
        MarketPhase::Correction,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketPhase::Bottom => "Bottom",
            MarketPhase::Recovery => "Recovery",
            MarketPhase::Growth => "Growth",
            MarketPhase::Peak => "Peak",
            MarketPhase::Correction => "Correction",
        }
    }

    /// Phase the cycle is expected to move into next
    pub fn next(&self) -> MarketPhase {
        match self {
            MarketPhase::Bottom => MarketPhase::Recovery,
            MarketPhase::Recovery => MarketPhase::Growth,
            MarketPhase::Growth => MarketPhase::Peak,
            MarketPhase::Peak => MarketPhase::Correction,
            MarketPhase::Correction => MarketPhase::Bottom,
        }
    }
}

impl fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MarketPhase {
    type Err = ComparisonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketPhase::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ComparisonError::InvalidInput(format!("unknown market phase: {}", s)))
    }
}

/// Recommended asset allocation in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub equity: u8,
    pub debt: u8,
    /// Large cap share of the equity sleeve
    pub large_cap: u8,
    pub mid_cap: u8,
    pub small_cap: u8,
}

impl AssetAllocation {
    /// Equity/debt and the equity sub-split each sum to 100
    pub fn is_balanced(&self) -> bool {
        u16::from(self.equity) + u16::from(self.debt) == 100
            && u16::from(self.large_cap) + u16::from(self.mid_cap) + u16::from(self.small_cap) == 100
    }
}

/// Market health indicators, each scored 0-10
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketIndicators {
    /// Higher means more volatile
    pub volatility: f64,
    /// Higher means more expensive
    pub valuation: f64,
    /// Higher means more bullish
    pub sentiment: f64,
    pub liquidity: f64,
}

/// Snapshot of the market regime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCycle {
    pub phase: MarketPhase,
    /// 1-10
    pub confidence: u8,
    pub months_in_phase: u32,
    pub reasoning: String,
    pub expected_next: String,
    pub allocation: AssetAllocation,
    pub indicators: MarketIndicators,
    pub detected_at: DateTime<Utc>,
}

/// Recommendation label derived from a fund score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    WeakHold,
    Avoid,
}

impl Recommendation {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 8.5 => Recommendation::StrongBuy,
            s if s >= 7.5 => Recommendation::Buy,
            s if s >= 6.5 => Recommendation::Hold,
            s if s >= 5.5 => Recommendation::WeakHold,
            _ => Recommendation::Avoid,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "STRONG BUY",
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::WeakHold => "WEAK HOLD",
            Recommendation::Avoid => "AVOID",
        }
    }

    /// Label used by advisory screens, same thresholds
    pub fn presentation_label(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "SUITABLE",
            Recommendation::Buy => "CONSIDER",
            Recommendation::Hold => "REVIEW",
            Recommendation::WeakHold => "CAUTION",
            Recommendation::Avoid => "AVOID",
        }
    }
}

/// Direction of recent returns relative to the longer history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecentTrend {
    Improving,
    Declining,
    Stable,
}

impl RecentTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecentTrend::Improving => "improving",
            RecentTrend::Declining => "declining",
            RecentTrend::Stable => "stable",
        }
    }
}

/// Per-fund result of one comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundAnalysis {
    pub scheme_code: String,
    pub name: String,
    pub category: FundCategory,
    pub portfolio_score: f64,
    pub recent_performance_score: f64,
    pub expense_score: f64,
    pub market_fit_score: f64,
    pub base_ai_score: f64,
    pub market_adjusted_score: f64,
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub recent_trend: RecentTrend,
    pub insight: String,
    /// True when any input was replaced by a neutral default
    #[serde(default)]
    pub degraded: bool,
}

impl FundAnalysis {
    /// Rebuild an analysis from a cached record, reporting `confidence`
    pub fn from_record(record: &StabilityRecord, confidence: f64) -> Self {
        Self {
            scheme_code: record.scheme_code.clone(),
            name: record.name.clone(),
            category: record.category.clone(),
            portfolio_score: record.portfolio_score,
            recent_performance_score: record.recent_performance_score,
            expense_score: record.expense_score,
            market_fit_score: record.market_fit_score,
            base_ai_score: record.base_score,
            market_adjusted_score: record.market_adjusted_score,
            confidence,
            recommendation: Recommendation::from_score(record.market_adjusted_score),
            recent_trend: record.recent_trend,
            insight: record.insight.clone(),
            degraded: record.degraded,
        }
    }
}

/// Stored score of one fund for one cache window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityRecord {
    pub scheme_code: String,
    pub name: String,
    pub category: FundCategory,
    pub portfolio_score: f64,
    pub recent_performance_score: f64,
    pub expense_score: f64,
    pub market_fit_score: f64,
    pub recent_trend: RecentTrend,
    pub insight: String,
    #[serde(default)]
    pub degraded: bool,
    pub base_score: f64,
    pub market_adjusted_score: f64,
    pub confidence: f64,
    pub computed_at: DateTime<Utc>,
    pub next_review: DateTime<Utc>,
}

impl StabilityRecord {
    pub fn from_analysis(analysis: &FundAnalysis, computed_at: DateTime<Utc>, next_review: DateTime<Utc>) -> Self {
        Self {
            scheme_code: analysis.scheme_code.clone(),
            name: analysis.name.clone(),
            category: analysis.category.clone(),
            portfolio_score: analysis.portfolio_score,
            recent_performance_score: analysis.recent_performance_score,
            expense_score: analysis.expense_score,
            market_fit_score: analysis.market_fit_score,
            recent_trend: analysis.recent_trend,
            insight: analysis.insight.clone(),
            degraded: analysis.degraded,
            base_score: analysis.base_ai_score,
            market_adjusted_score: analysis.market_adjusted_score,
            confidence: analysis.confidence,
            computed_at,
            next_review,
        }
    }
}

/// Market timing summary attached to a comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTiming {
    pub phase: MarketPhase,
    pub allocation: AssetAllocation,
    pub confidence: f64,
    pub advice: String,
    pub next_review: DateTime<Utc>,
}

/// Cached comparison of one fund set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonCacheEntry {
    pub key: String,
    pub records: Vec<StabilityRecord>,
    pub market_context: String,
    pub average_confidence: f64,
    pub market_timing: MarketTiming,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl ComparisonCacheEntry {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }

    pub fn record_for(&self, scheme_code: &str) -> Option<&StabilityRecord> {
        self.records.iter().find(|r| r.scheme_code == scheme_code)
    }

    /// Time left before the entry expires, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.valid_until - now).max(Duration::zero())
    }

    /// Linearly decay a stored confidence down to `CONFIDENCE_DECAY_FLOOR` of
    /// its value at `valid_until`
    pub fn decayed_confidence(&self, confidence: f64, now: DateTime<Utc>) -> f64 {
        let window = (self.valid_until - self.created_at).num_seconds();
        if window <= 0 {
            return confidence * CONFIDENCE_DECAY_FLOOR;
        }

        let elapsed = (now - self.created_at).num_seconds().clamp(0, window);
        let fraction = elapsed as f64 / window as f64;

        confidence * (1.0 - (1.0 - CONFIDENCE_DECAY_FLOOR) * fraction)
    }
}

/// Ranked outcome of comparing a fund set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedComparisonResult {
    pub best_fund: String,
    pub best_fund_code: String,
    pub best_score: f64,
    /// One analysis per fund, in input order
    pub analyses: Vec<FundAnalysis>,
    pub reasoning: String,
    pub recommendation: String,
    pub market_timing: MarketTiming,
    pub is_stable_result: bool,
    pub valid_until: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entry(created_at: DateTime<Utc>, window_days: i64) -> ComparisonCacheEntry {
        ComparisonCacheEntry {
            key: "k".to_string(),
            records: vec![],
            market_context: String::new(),
            average_confidence: 8.0,
            market_timing: MarketTiming {
                phase: MarketPhase::Growth,
                allocation: AssetAllocation { equity: 70, debt: 30, large_cap: 50, mid_cap: 30, small_cap: 20 },
                confidence: 8.0,
                advice: String::new(),
                next_review: created_at + Duration::days(window_days),
            },
            created_at,
            valid_until: created_at + Duration::days(window_days),
        }
    }

    #[test]
    fn test_category_from_label() {
        assert_eq!(FundCategory::from_label("Equity: Large Cap"), FundCategory::LargeCap);
        assert_eq!(FundCategory::from_label("small cap fund"), FundCategory::SmallCap);
        assert_eq!(FundCategory::from_label("ELSS"), FundCategory::Elss);
        assert_eq!(FundCategory::from_label("Debt - Gilt"), FundCategory::Debt);
        assert_eq!(FundCategory::from_label("Balanced Advantage"), FundCategory::Hybrid);
        assert_eq!(FundCategory::from_label("Nifty 50 Index"), FundCategory::Index);
        assert_eq!(
            FundCategory::from_label(" Sectoral - Pharma "),
            FundCategory::Other("Sectoral - Pharma".to_string())
        );
    }

    #[test]
    fn test_category_serde_uses_label() {
        let json = serde_json::to_string(&FundCategory::MidCap).unwrap();
        assert_eq!(json, "\"Mid Cap\"");

        let parsed: FundCategory = serde_json::from_str("\"Large Cap\"").unwrap();
        assert_eq!(parsed, FundCategory::LargeCap);
    }

    #[test]
    fn test_fund_record_defaults() {
        let json = r#"{"scheme_code":"120503","name":"Test Fund","category":"Mid Cap"}"#;
        let fund: FundRecord = serde_json::from_str(json).unwrap();

        assert_eq!(fund.returns, TrailingReturns::default());
        assert!(fund.expense_ratio.is_none());
        assert_eq!(fund.aum, 0.0);
        assert_eq!(fund.missing_fields(), vec!["returns", "expense_ratio", "aum"]);
    }

    #[test]
    fn test_non_finite_fields_count_as_missing() {
        let fund = FundRecord::new("1", "Broken Feed", FundCategory::Debt)
            .with_returns(TrailingReturns { one_month: f64::NAN, one_year: f64::INFINITY, ..Default::default() })
            .with_expense_ratio(f64::NAN)
            .with_aum(f64::INFINITY);

        assert!(fund.returns.is_empty());
        assert_eq!(fund.missing_fields(), vec!["returns", "expense_ratio", "aum"]);
    }

    #[test]
    fn test_phase_parse_and_cycle() {
        assert_eq!("peak".parse::<MarketPhase>().unwrap(), MarketPhase::Peak);
        assert!("sideways".parse::<MarketPhase>().is_err());

        let mut phase = MarketPhase::Bottom;
        for _ in 0..5 {
            phase = phase.next();
        }
        assert_eq!(phase, MarketPhase::Bottom);
    }

    #[test]
    fn test_recommendation_thresholds() {
        assert_eq!(Recommendation::from_score(8.5), Recommendation::StrongBuy);
        assert_eq!(Recommendation::from_score(8.49), Recommendation::Buy);
        assert_eq!(Recommendation::from_score(7.5), Recommendation::Buy);
        assert_eq!(Recommendation::from_score(6.5), Recommendation::Hold);
        assert_eq!(Recommendation::from_score(5.5), Recommendation::WeakHold);
        assert_eq!(Recommendation::from_score(5.49), Recommendation::Avoid);
        assert_eq!(Recommendation::Hold.presentation_label(), "REVIEW");
    }

    #[test]
    fn test_entry_validity_boundary() {
        let created = Utc::now();
        let entry = test_entry(created, 7);

        assert!(entry.is_valid_at(created));
        assert!(!entry.is_valid_at(entry.valid_until));
        assert_eq!(entry.remaining(entry.valid_until + Duration::days(1)), Duration::zero());
    }

    #[test]
    fn test_confidence_decay() {
        let created = Utc::now();
        let entry = test_entry(created, 7);

        assert!((entry.decayed_confidence(8.0, created) - 8.0).abs() < 1e-9);
        let halfway = created + Duration::seconds(7 * 24 * 3600 / 2);
        assert!((entry.decayed_confidence(8.0, halfway) - 6.8).abs() < 1e-9);
        assert!((entry.decayed_confidence(8.0, entry.valid_until) - 5.6).abs() < 1e-9);
        // clamps past expiry
        assert!((entry.decayed_confidence(8.0, entry.valid_until + Duration::days(3)) - 5.6).abs() < 1e-9);
    }
}
