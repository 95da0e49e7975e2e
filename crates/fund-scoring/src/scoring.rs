//! Fund Scoring Primitives
//!
//! Pure functions scoring a fund on a 0-10 scale, plus the fixed weights that
//! blend them into the composite AI score.

use fund_core::{FundCategory, FundRecord, MarketPhase, Recommendation};

/// Weights of the composite score, in whole percent.
///
/// These are part of the engine's contract: changing them changes rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeWeights {
    pub portfolio: u32,
    pub recent_performance: u32,
    pub expense: u32,
    pub market_cycle: u32,
}

impl CompositeWeights {
    pub const STANDARD: CompositeWeights = CompositeWeights {
        portfolio: 40,
        recent_performance: 35,
        expense: 15,
        market_cycle: 10,
    };

    pub fn total(&self) -> u32 {
        self.portfolio + self.recent_performance + self.expense + self.market_cycle
    }

    /// Weighted blend of the component scores. The market term is the
    /// category weight rescaled to the 0-10 range (neutral weight 1.0 -> 5).
    pub fn composite_score(
        &self,
        portfolio_score: f64,
        momentum_score: f64,
        expense_score: f64,
        market_cycle_weight: f64,
    ) -> f64 {
        let pct = |w: u32| f64::from(w) / 100.0;

        pct(self.portfolio) * portfolio_score
            + pct(self.recent_performance) * momentum_score
            + pct(self.expense) * expense_score
            + pct(self.market_cycle) * (5.0 * market_cycle_weight)
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Portfolio quality from fund size and category
pub fn calculate_portfolio_score(fund: &FundRecord) -> f64 {
    let mut score = 5.0;
    let aum = if fund.aum.is_finite() { fund.aum } else { 0.0 };

    if aum > 10_000.0 {
        score += 1.0;
    } else if aum > 5_000.0 {
        score += 0.5;
    }

    match fund.category {
        FundCategory::LargeCap => score += 0.5,
        // growth-potential premium
        FundCategory::SmallCap => score += 1.0,
        _ => {}
    }

    f64::clamp(score, 1.0, 10.0)
}

/// Banded inverse mapping of the expense ratio; unknown ratios score neutral
pub fn calculate_expense_score(fund: &FundRecord) -> f64 {
    match fund.expense_ratio.filter(|r| r.is_finite()) {
        None => 5.0,
        Some(r) if r < 0.5 => 9.0,
        Some(r) if r < 1.0 => 8.0,
        Some(r) if r < 1.5 => 6.0,
        Some(r) if r < 2.0 => 4.0,
        Some(_) => 2.0,
    }
}

pub fn get_recommendation(score: f64) -> Recommendation {
    Recommendation::from_score(score)
}

/// Columns of the cycle weight table
const WEIGHT_COLUMNS: usize = 6;

/// Rows follow `MarketPhase::ALL`; columns are
/// Large Cap, Mid Cap, Small Cap, ELSS, Debt, Hybrid.
const MARKET_CYCLE_WEIGHTS: [[f64; WEIGHT_COLUMNS]; 5] = [
    // Bottom: small and mid caps are cheapest
    [1.0, 1.2, 1.3, 1.2, 0.7, 0.9],
    // Recovery
    [1.1, 1.2, 1.2, 1.1, 0.8, 1.0],
    // Growth
    [1.1, 1.1, 1.0, 1.1, 0.9, 1.0],
    // Peak: rotate toward quality and debt
    [1.1, 0.9, 0.8, 0.9, 1.3, 1.1],
    // Correction
    [1.0, 0.8, 0.7, 0.9, 1.4, 1.1],
];

fn weight_column(category: &FundCategory) -> Option<usize> {
    match category {
        FundCategory::LargeCap => Some(0),
        FundCategory::MidCap => Some(1),
        FundCategory::SmallCap => Some(2),
        FundCategory::Elss => Some(3),
        FundCategory::Debt => Some(4),
        FundCategory::Hybrid => Some(5),
        FundCategory::Index | FundCategory::Other(_) => None,
    }
}

fn phase_row(phase: MarketPhase) -> usize {
    match phase {
        MarketPhase::Bottom => 0,
        MarketPhase::Recovery => 1,
        MarketPhase::Growth => 2,
        MarketPhase::Peak => 3,
        MarketPhase::Correction => 4,
    }
}

/// Multiplier applied to a category in a given market phase; 1.0 when the
/// category has no column in the table
pub fn get_market_cycle_weight(category: &FundCategory, phase: MarketPhase) -> f64 {
    weight_column(category)
        .map(|col| MARKET_CYCLE_WEIGHTS[phase_row(phase)][col])
        .unwrap_or(1.0)
}
