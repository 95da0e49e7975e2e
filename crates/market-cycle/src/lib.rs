use async_trait::async_trait;
use chrono::Utc;
use fund_core::{
    AssetAllocation, ComparisonError, MarketCycle, MarketCycleProvider, MarketIndicators, MarketPhase,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for the indicator endpoint
const INDICATOR_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Pre-fetched market indicators plus how long the market has been in its
/// current phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub indicators: MarketIndicators,
    #[serde(default)]
    pub months_in_phase: u32,
}

/// Recommended allocation for each phase
pub fn phase_allocation(phase: MarketPhase) -> AssetAllocation {
    let (equity, large_cap, mid_cap, small_cap) = match phase {
        MarketPhase::Bottom => (80, 40, 30, 30),
        MarketPhase::Recovery => (75, 45, 30, 25),
        MarketPhase::Growth => (70, 50, 30, 20),
        MarketPhase::Peak => (50, 70, 20, 10),
        MarketPhase::Correction => (60, 60, 25, 15),
    };

    AssetAllocation {
        equity,
        debt: 100 - equity,
        large_cap,
        mid_cap,
        small_cap,
    }
}

fn expected_next_phase(phase: MarketPhase) -> String {
    let outlook = match phase {
        MarketPhase::Bottom => "improving liquidity should lift beaten-down segments first",
        MarketPhase::Recovery => "broad, earnings-led participation",
        MarketPhase::Growth => "watch for stretched valuations and euphoric sentiment",
        MarketPhase::Peak => "elevated risk of a volatility-led pullback",
        MarketPhase::Correction => "capitulation, then value emerging in small and mid caps",
    };
    format!("{} - {}", phase.next().name(), outlook)
}

/// Market cycle analyzer
pub struct MarketCycleAnalyzer {
    /// Snapshot used when no indicator service is configured
    snapshot: Option<MarketSnapshot>,

    /// JSON endpoint serving a `MarketSnapshot`
    indicator_service_url: Option<String>,

    client: Client,
}

impl MarketCycleAnalyzer {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            indicator_service_url: None,
            client: Client::new(),
        }
    }

    /// Fetch the indicator snapshot from `url` on every lookup
    pub fn with_indicator_service(url: String) -> Self {
        Self {
            snapshot: None,
            indicator_service_url: Some(url),
            client: Client::new(),
        }
    }

    /// Determine the market cycle from a snapshot using rule-based scoring
    pub fn determine_cycle(snapshot: &MarketSnapshot) -> MarketCycle {
        let indicators = clamp_indicators(&snapshot.indicators);
        let scores = Self::score_phases(&indicators);

        let (mut phase, mut best) = scores[0];
        for &(candidate, score) in &scores[1..] {
            if score > best {
                phase = candidate;
                best = score;
            }
        }

        let reasoning = if best == 0.0 {
            // nothing matched; assume the mid-cycle default
            phase = MarketPhase::Growth;
            format!(
                "No phase signal dominant (valuation {:.1}/10, sentiment {:.1}/10, volatility {:.1}/10, liquidity {:.1}/10); assuming mid-cycle",
                indicators.valuation, indicators.sentiment, indicators.volatility, indicators.liquidity
            )
        } else {
            format!(
                "{} phase (valuation {:.1}/10, sentiment {:.1}/10, volatility {:.1}/10, liquidity {:.1}/10), {} months in phase",
                phase.name(),
                indicators.valuation,
                indicators.sentiment,
                indicators.volatility,
                indicators.liquidity,
                snapshot.months_in_phase
            )
        };

        let confidence = (best / 10.0).round().clamp(1.0, 10.0) as u8;

        debug!("Market cycle determined: {} (confidence {}/10)", phase, confidence);

        MarketCycle {
            phase,
            confidence,
            months_in_phase: snapshot.months_in_phase,
            reasoning,
            expected_next: expected_next_phase(phase),
            allocation: phase_allocation(phase),
            indicators,
            detected_at: Utc::now(),
        }
    }

    /// Score each phase out of 100 from the indicators
    fn score_phases(ind: &MarketIndicators) -> [(MarketPhase, f64); 5] {
        let mut scores = [
            (MarketPhase::Bottom, 0.0),
            (MarketPhase::Recovery, 0.0),
            (MarketPhase::Growth, 0.0),
            (MarketPhase::Peak, 0.0),
            (MarketPhase::Correction, 0.0),
        ];

        // Bottom: cheap valuations, fearful sentiment
        if ind.valuation <= 3.0 {
            scores[0].1 += 40.0;
        }
        if ind.sentiment <= 3.0 {
            scores[0].1 += 30.0;
        }
        if ind.volatility >= 6.0 {
            scores[0].1 += 15.0;
        }
        if ind.liquidity >= 6.0 {
            scores[0].1 += 15.0;
        }

        // Recovery: valuations normalizing, liquidity returning
        if (3.0..=5.5).contains(&ind.valuation) {
            scores[1].1 += 30.0;
        }
        if (3.0..=6.0).contains(&ind.sentiment) {
            scores[1].1 += 25.0;
        }
        if (4.0..=7.0).contains(&ind.volatility) {
            scores[1].1 += 20.0;
        }
        if ind.liquidity >= 6.0 {
            scores[1].1 += 25.0;
        }

        // Growth: fair-to-full valuations, calm markets
        if (5.0..=7.5).contains(&ind.valuation) {
            scores[2].1 += 30.0;
        }
        if (5.0..=8.0).contains(&ind.sentiment) {
            scores[2].1 += 30.0;
        }
        if ind.volatility <= 4.0 {
            scores[2].1 += 25.0;
        }
        if ind.liquidity >= 5.0 {
            scores[2].1 += 15.0;
        }

        // Peak: stretched valuations, euphoria
        if ind.valuation >= 8.0 {
            scores[3].1 += 40.0;
        }
        if ind.sentiment >= 8.0 {
            scores[3].1 += 30.0;
        }
        if ind.volatility <= 3.0 {
            scores[3].1 += 15.0;
        }
        if ind.liquidity <= 4.0 {
            scores[3].1 += 15.0;
        }

        // Correction: volatility spike with souring sentiment
        if ind.volatility >= 7.0 {
            scores[4].1 += 35.0;
        }
        if ind.sentiment <= 4.0 {
            scores[4].1 += 30.0;
        }
        if ind.valuation >= 6.0 {
            scores[4].1 += 20.0;
        }
        if ind.liquidity <= 5.0 {
            scores[4].1 += 15.0;
        }

        scores
    }

    /// Fetch the snapshot from the indicator service
    async fn fetch_snapshot(&self, url: &str) -> Result<MarketSnapshot, ComparisonError> {
        let response = self
            .client
            .get(url)
            .timeout(INDICATOR_REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("Market indicator service failed: {}", e);
                ComparisonError::MarketCycleUnavailable(e.to_string())
            })?;

        response
            .json::<MarketSnapshot>()
            .await
            .map_err(|e| ComparisonError::MarketCycleUnavailable(format!("invalid indicator payload: {}", e)))
    }
}

fn clamp_indicators(ind: &MarketIndicators) -> MarketIndicators {
    MarketIndicators {
        volatility: ind.volatility.clamp(0.0, 10.0),
        valuation: ind.valuation.clamp(0.0, 10.0),
        sentiment: ind.sentiment.clamp(0.0, 10.0),
        liquidity: ind.liquidity.clamp(0.0, 10.0),
    }
}

#[async_trait]
impl MarketCycleProvider for MarketCycleAnalyzer {
    async fn current_market_cycle(&self) -> Result<MarketCycle, ComparisonError> {
        if let Some(url) = &self.indicator_service_url {
            let snapshot = self.fetch_snapshot(url).await?;
            return Ok(Self::determine_cycle(&snapshot));
        }

        match &self.snapshot {
            Some(snapshot) => Ok(Self::determine_cycle(snapshot)),
            None => Err(ComparisonError::MarketCycleUnavailable(
                "no market snapshot or indicator service configured".to_string(),
            )),
        }
    }
}

/// Provider returning a fixed market cycle
#[derive(Debug, Clone)]
pub struct StaticMarketCycle {
    cycle: MarketCycle,
}

impl StaticMarketCycle {
    pub fn new(cycle: MarketCycle) -> Self {
        Self { cycle }
    }

    /// Canonical cycle for `phase` with the given confidence
    pub fn for_phase(phase: MarketPhase, confidence: u8) -> Self {
        let indicators = match phase {
            MarketPhase::Bottom => MarketIndicators { volatility: 7.0, valuation: 2.0, sentiment: 2.0, liquidity: 6.0 },
            MarketPhase::Recovery => MarketIndicators { volatility: 5.0, valuation: 4.0, sentiment: 4.5, liquidity: 7.0 },
            MarketPhase::Growth => MarketIndicators { volatility: 3.0, valuation: 6.0, sentiment: 6.5, liquidity: 6.0 },
            MarketPhase::Peak => MarketIndicators { volatility: 2.0, valuation: 9.0, sentiment: 9.0, liquidity: 3.0 },
            MarketPhase::Correction => MarketIndicators { volatility: 8.0, valuation: 6.5, sentiment: 3.0, liquidity: 4.0 },
        };

        Self {
            cycle: MarketCycle {
                phase,
                confidence: confidence.clamp(1, 10),
                months_in_phase: 0,
                reasoning: format!("{} phase set explicitly", phase.name()),
                expected_next: expected_next_phase(phase),
                allocation: phase_allocation(phase),
                indicators,
                detected_at: Utc::now(),
            },
        }
    }

    pub fn cycle(&self) -> &MarketCycle {
        &self.cycle
    }
}

#[async_trait]
impl MarketCycleProvider for StaticMarketCycle {
    async fn current_market_cycle(&self) -> Result<MarketCycle, ComparisonError> {
        Ok(self.cycle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(volatility: f64, valuation: f64, sentiment: f64, liquidity: f64) -> MarketSnapshot {
        MarketSnapshot {
            indicators: MarketIndicators { volatility, valuation, sentiment, liquidity },
            months_in_phase: 4,
        }
    }

    #[test]
    fn test_bottom_detection() {
        let cycle = MarketCycleAnalyzer::determine_cycle(&snapshot(7.0, 2.0, 2.0, 6.0));

        assert_eq!(cycle.phase, MarketPhase::Bottom);
        assert_eq!(cycle.confidence, 10);
        assert!(cycle.expected_next.starts_with("Recovery"));
    }

    #[test]
    fn test_peak_detection() {
        let cycle = MarketCycleAnalyzer::determine_cycle(&snapshot(2.0, 9.0, 9.0, 3.0));

        assert_eq!(cycle.phase, MarketPhase::Peak);
        assert_eq!(cycle.allocation.debt, 50);
    }

    #[test]
    fn test_correction_detection() {
        let cycle = MarketCycleAnalyzer::determine_cycle(&snapshot(8.0, 6.5, 3.0, 4.0));

        assert_eq!(cycle.phase, MarketPhase::Correction);
    }

    #[test]
    fn test_canonical_snapshots_round_trip() {
        for phase in MarketPhase::ALL {
            let fixed = StaticMarketCycle::for_phase(phase, 7);
            let detected = MarketCycleAnalyzer::determine_cycle(&MarketSnapshot {
                indicators: fixed.cycle().indicators,
                months_in_phase: 1,
            });
            assert_eq!(detected.phase, phase, "indicators for {} misclassified", phase);
        }
    }

    #[test]
    fn test_out_of_range_indicators_are_clamped() {
        let cycle = MarketCycleAnalyzer::determine_cycle(&snapshot(-5.0, 42.0, 15.0, -1.0));

        assert_eq!(cycle.indicators.valuation, 10.0);
        assert_eq!(cycle.indicators.volatility, 0.0);
        assert!((1..=10).contains(&cycle.confidence));
    }

    #[test]
    fn test_allocations_are_balanced() {
        for phase in MarketPhase::ALL {
            assert!(phase_allocation(phase).is_balanced(), "{} allocation", phase);
        }
    }

    #[test]
    fn test_snapshot_months_default() {
        let json = r#"{"indicators":{"volatility":5.0,"valuation":5.0,"sentiment":5.0,"liquidity":5.0}}"#;
        let parsed: MarketSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.months_in_phase, 0);
    }

    #[tokio::test]
    async fn test_provider_classifies_configured_snapshot() {
        let analyzer = MarketCycleAnalyzer::new(snapshot(2.0, 9.0, 9.0, 3.0));
        let cycle = analyzer.current_market_cycle().await.unwrap();

        assert_eq!(cycle.phase, MarketPhase::Peak);
        assert_eq!(cycle.months_in_phase, 4);
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticMarketCycle::for_phase(MarketPhase::Growth, 15);
        let cycle = provider.current_market_cycle().await.unwrap();

        assert_eq!(cycle.phase, MarketPhase::Growth);
        assert_eq!(cycle.confidence, 10);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_surfaced() {
        let analyzer = MarketCycleAnalyzer::with_indicator_service("http://127.0.0.1:9/indicators".to_string());
        let err = analyzer.current_market_cycle().await.unwrap_err();

        assert!(matches!(err, ComparisonError::MarketCycleUnavailable(_)));
        assert!(err.is_retryable());
    }
}
