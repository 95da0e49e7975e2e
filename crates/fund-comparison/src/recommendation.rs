//! Recommendation Text
//!
//! Deterministic natural-language reasoning for a completed comparison.

use fund_core::{AssetAllocation, FundAnalysis, FundRecord, MarketCycle, MarketPhase};

const PORTFOLIO_THRESHOLD: f64 = 7.0;
const RECENT_THRESHOLD: f64 = 7.0;
const EXPENSE_THRESHOLD: f64 = 7.0;
const MARKET_FIT_THRESHOLD: f64 = 6.0;

fn join_phrases(phrases: &[String]) -> String {
    match phrases {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Explain why `best` ranked first
pub fn generate_enhanced_reasoning(analyses: &[FundAnalysis], best: &FundAnalysis, market_cycle: &MarketCycle) -> String {
    reasoning_for_phase(analyses, best, market_cycle.phase)
}

pub(crate) fn reasoning_for_phase(analyses: &[FundAnalysis], best: &FundAnalysis, phase: MarketPhase) -> String {
    let mut strengths = Vec::new();
    if best.portfolio_score > PORTFOLIO_THRESHOLD {
        strengths.push(format!("a strong portfolio profile ({:.1}/10)", best.portfolio_score));
    }
    if best.recent_performance_score > RECENT_THRESHOLD {
        strengths.push(format!("strong recent momentum ({:.1}/10)", best.recent_performance_score));
    }
    if best.expense_score > EXPENSE_THRESHOLD {
        strengths.push(format!("low costs ({:.1}/10)", best.expense_score));
    }
    if best.market_fit_score > MARKET_FIT_THRESHOLD {
        strengths.push(format!("a good fit for current market conditions ({:.1}/10)", best.market_fit_score));
    }

    let mut text = format!("In the current {} market phase, ", phase.name());
    if strengths.is_empty() {
        text.push_str(&format!(
            "{} offers the most balanced profile among the {} funds compared",
            best.name,
            analyses.len()
        ));
    } else {
        text.push_str(&format!("{} stands out for {}", best.name, join_phrases(&strengths)));
    }
    text.push_str(&format!(
        ", with a market-adjusted score of {:.1}/10",
        best.market_adjusted_score
    ));

    let runner_up = analyses
        .iter()
        .filter(|a| a.scheme_code != best.scheme_code)
        .fold(None::<&FundAnalysis>, |acc, a| match acc {
            Some(current) if current.market_adjusted_score >= a.market_adjusted_score => Some(current),
            _ => Some(a),
        });
    if let Some(runner_up) = runner_up {
        text.push_str(&format!(
            " ahead of {} ({:.1}/10)",
            runner_up.name, runner_up.market_adjusted_score
        ));
    }
    text.push('.');

    text
}

/// Category- and phase-aware investment guidance for the compared funds
pub fn generate_market_aware_recommendation(funds: &[FundRecord], market_cycle: &MarketCycle) -> String {
    recommendation_for_phase(funds, market_cycle.phase, &market_cycle.allocation)
}

pub(crate) fn recommendation_for_phase(funds: &[FundRecord], phase: MarketPhase, allocation: &AssetAllocation) -> String {
    let mut categories: Vec<&str> = Vec::new();
    for fund in funds {
        let label = fund.category.label();
        if !categories.contains(&label) {
            categories.push(label);
        }
    }

    match categories.as_slice() {
        [] => String::new(),
        [category] => match phase {
            MarketPhase::Bottom => format!(
                "All {} funds are {}. With markets near a bottom, accumulate gradually and tilt new money toward small caps for the recovery upside.",
                funds.len(),
                category
            ),
            MarketPhase::Peak => format!(
                "All {} funds are {}. With markets near a peak, prefer debt and reduce equity exposure; stagger any fresh {} investments.",
                funds.len(),
                category,
                category
            ),
            phase => format!(
                "All {} funds are {}. In the {} phase, continue steady SIP investments in the top-ranked fund.",
                funds.len(),
                category,
                phase.name()
            ),
        },
        many => format!(
            "These funds span {} categories ({}). Holding a mix diversifies risk; size positions to the {}% equity / {}% debt allocation suggested for the {} phase.",
            many.len(),
            many.join(", "),
            allocation.equity,
            allocation.debt,
            phase.name()
        ),
    }
}
