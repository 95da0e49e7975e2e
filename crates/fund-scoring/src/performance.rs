//! Recent Performance Analysis
//!
//! Turns a fund's trailing return series into a momentum score and a trend label.
//! Horizons reported as 0, NaN or infinite are treated as unknown and left out of the averages,
//! so sparse data pulls the score toward neutral rather than penalizing it.

use fund_core::{RecentTrend, TrailingReturns};
use serde::{Deserialize, Serialize};

const NEUTRAL_SCORE: f64 = 5.0;
/// Average return (percent) that maps to a neutral level contribution
const BASELINE_RETURN: f64 = 8.0;
const LEVEL_SCALE: f64 = 4.0;
const MAX_LEVEL_POINTS: f64 = 3.0;
const TREND_SCALE: f64 = 5.0;
const MAX_TREND_POINTS: f64 = 2.0;
/// Gap between short and long averages needed to call a trend
const TREND_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentPerformance {
    /// 0-10
    pub momentum_score: f64,
    pub recent_trend: RecentTrend,
    pub insight: String,
}

/// Mean of the finite non-zero values, `None` when every value is unknown
fn known_mean(values: &[f64]) -> Option<f64> {
    let known: Vec<f64> = values.iter().copied().filter(|v| v.is_finite() && *v != 0.0).collect();
    if known.is_empty() {
        None
    } else {
        Some(known.iter().sum::<f64>() / known.len() as f64)
    }
}

pub fn analyze_recent_performance(returns: &TrailingReturns) -> RecentPerformance {
    let Some(overall) = known_mean(&returns.horizons()) else {
        return RecentPerformance {
            momentum_score: NEUTRAL_SCORE,
            recent_trend: RecentTrend::Stable,
            insight: "Insufficient return history; momentum treated as neutral".to_string(),
        };
    };

    let level_points = ((overall - BASELINE_RETURN) / LEVEL_SCALE).clamp(-MAX_LEVEL_POINTS, MAX_LEVEL_POINTS);

    let short_avg = known_mean(&returns.short_term());
    let long_avg = known_mean(&returns.long_term());

    let (trend_points, recent_trend) = match (short_avg, long_avg) {
        (Some(short), Some(long)) => {
            let diff = short - long;
            let trend = if diff > TREND_THRESHOLD {
                RecentTrend::Improving
            } else if diff < -TREND_THRESHOLD {
                RecentTrend::Declining
            } else {
                RecentTrend::Stable
            };
            ((diff / TREND_SCALE).clamp(-MAX_TREND_POINTS, MAX_TREND_POINTS), trend)
        }
        _ => (0.0, RecentTrend::Stable),
    };

    let momentum_score = (NEUTRAL_SCORE + level_points + trend_points).clamp(0.0, 10.0);

    let insight = match recent_trend {
        RecentTrend::Improving => format!(
            "Short-term returns ({:.1}%) are running ahead of the longer-term average ({:.1}%)",
            short_avg.unwrap_or_default(),
            long_avg.unwrap_or_default()
        ),
        RecentTrend::Declining => format!(
            "Short-term returns ({:.1}%) are lagging the longer-term average ({:.1}%)",
            short_avg.unwrap_or_default(),
            long_avg.unwrap_or_default()
        ),
        RecentTrend::Stable if overall >= BASELINE_RETURN => {
            format!("Consistent performance averaging {:.1}% across reported periods", overall)
        }
        RecentTrend::Stable => {
            format!("Muted performance averaging {:.1}% across reported periods", overall)
        }
    };

    RecentPerformance {
        momentum_score,
        recent_trend,
        insight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_is_neutral() {
        let result = analyze_recent_performance(&TrailingReturns::default());
        assert_eq!(result.momentum_score, 5.0);
        assert_eq!(result.recent_trend, RecentTrend::Stable);
    }

    #[test]
    fn test_single_horizon_uses_level_only() {
        let returns = TrailingReturns { one_year: 12.0, ..Default::default() };
        let result = analyze_recent_performance(&returns);

        assert!((result.momentum_score - 6.0).abs() < 1e-9);
        assert_eq!(result.recent_trend, RecentTrend::Stable);

        let stronger = TrailingReturns { one_year: 22.0, ..Default::default() };
        assert!((analyze_recent_performance(&stronger).momentum_score - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_improving_trend() {
        let returns = TrailingReturns {
            one_month: 12.0,
            two_month: 14.0,
            three_month: 16.0,
            one_year: 6.0,
            three_year: 8.0,
            ..Default::default()
        };
        let result = analyze_recent_performance(&returns);

        assert_eq!(result.recent_trend, RecentTrend::Improving);
        assert!(result.momentum_score > 5.0);
        assert!(result.insight.contains("ahead"));
    }

    #[test]
    fn test_declining_trend() {
        let returns = TrailingReturns {
            one_month: -4.0,
            three_month: -2.0,
            one_year: 15.0,
            five_year: 18.0,
            ..Default::default()
        };
        let result = analyze_recent_performance(&returns);

        assert_eq!(result.recent_trend, RecentTrend::Declining);
        assert!(result.insight.contains("lagging"));
    }

    #[test]
    fn test_extreme_inputs_stay_in_bounds() {
        let crash = TrailingReturns {
            one_month: -90.0,
            two_month: -90.0,
            three_month: -90.0,
            six_month: 200.0,
            one_year: 300.0,
            three_year: 400.0,
            five_year: 500.0,
        };
        let boom = TrailingReturns {
            one_month: 500.0,
            two_month: 500.0,
            three_month: 500.0,
            six_month: -50.0,
            one_year: -50.0,
            three_year: -50.0,
            five_year: -50.0,
        };

        for returns in [crash, boom] {
            let score = analyze_recent_performance(&returns).momentum_score;
            assert!((0.0..=10.0).contains(&score));
        }
    }

    #[test]
    fn test_non_finite_horizons_are_unknown() {
        let returns = TrailingReturns {
            one_month: f64::NAN,
            two_month: f64::INFINITY,
            six_month: f64::INFINITY,
            one_year: 12.0,
            ..Default::default()
        };
        let result = analyze_recent_performance(&returns);

        assert!((result.momentum_score - 6.0).abs() < 1e-9);
        assert_eq!(result.recent_trend, RecentTrend::Stable);

        let only_nan = TrailingReturns { one_month: f64::NAN, five_year: f64::NEG_INFINITY, ..Default::default() };
        assert_eq!(analyze_recent_performance(&only_nan).momentum_score, 5.0);
    }
}
