//! compare-cli: rank 2-5 mutual funds for the current market cycle.
//!
//! Usage:
//!   cargo run -p compare-cli -- --funds funds.json --market snapshot.json
//!   cargo run -p compare-cli -- --funds funds.json --phase bottom --fresh
//!
//! Without `--market` or `--phase`, indicators are fetched from
//! `MARKET_INDICATORS_URL`.

use anyhow::{bail, Context};
use clap::Parser;
use fund_comparison::{ComparisonConfig, FundComparisonLogic};
use fund_core::{ComparisonCacheStore, FundRecord, MarketCycleProvider, MarketPhase};
use market_cycle::{MarketCycleAnalyzer, MarketSnapshot, StaticMarketCycle};
use stable_comparison::InMemoryCacheStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "compare-cli")]
#[command(about = "Market-cycle aware mutual fund comparison", long_about = None)]
struct Args {
    /// JSON array of fund records
    #[arg(short, long)]
    funds: PathBuf,

    /// JSON market indicator snapshot
    #[arg(short, long, conflicts_with = "phase")]
    market: Option<PathBuf>,

    /// Force a market phase (bottom, recovery, growth, peak, correction)
    #[arg(short, long)]
    phase: Option<MarketPhase>,

    /// Confidence reported with a forced phase
    #[arg(long, default_value_t = 7, requires = "phase")]
    confidence: u8,

    /// Skip the comparison cache
    #[arg(long)]
    fresh: bool,
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "compare_cli=info,fund_comparison=info".into());

    // Logs go to stderr so stdout stays valid JSON
    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn market_provider(args: &Args, config: &ComparisonConfig) -> anyhow::Result<Arc<dyn MarketCycleProvider>> {
    if let Some(phase) = args.phase {
        info!("Using forced {} phase", phase);
        return Ok(Arc::new(StaticMarketCycle::for_phase(phase, args.confidence)));
    }
    if let Some(path) = &args.market {
        let snapshot: MarketSnapshot = read_json(path)?;
        return Ok(Arc::new(MarketCycleAnalyzer::new(snapshot)));
    }
    match &config.market_indicators_url {
        Some(url) => Ok(Arc::new(MarketCycleAnalyzer::with_indicator_service(url.clone()))),
        None => bail!("no market data: pass --market or --phase, or set MARKET_INDICATORS_URL"),
    }
}

#[cfg(feature = "redis")]
async fn cache_store(config: &ComparisonConfig) -> anyhow::Result<Arc<dyn ComparisonCacheStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = stable_comparison::RedisCacheStore::connect(url).await?;
            info!("Caching comparisons in Redis");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryCacheStore::new())),
    }
}

#[cfg(not(feature = "redis"))]
async fn cache_store(config: &ComparisonConfig) -> anyhow::Result<Arc<dyn ComparisonCacheStore>> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but compare-cli was built without the redis feature");
    }
    Ok(Arc::new(InMemoryCacheStore::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = ComparisonConfig::from_env()?;

    let funds: Vec<FundRecord> = read_json(&args.funds)?;
    info!("Loaded {} funds from {}", funds.len(), args.funds.display());

    let logic = FundComparisonLogic::from_config(&config, market_provider(&args, &config)?, cache_store(&config).await?);

    let result = if args.fresh {
        logic.compare_funds_fresh(&funds).await?
    } else {
        logic.compare_funds(&funds).await?
    };

    match result {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => eprintln!("Need at least 2 funds to compare, got {}", funds.len()),
    }

    Ok(())
}
