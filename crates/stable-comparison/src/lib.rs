//! Stable Fund Comparison
//!
//! Time-windowed cache of comparison results keyed by fund set, and the
//! market-adjusted stability score stored for each fund.

pub mod stability;
pub mod store;

pub use stability::{StabilityScore, StableFundComparison, DEFAULT_NAMESPACE};
pub use store::InMemoryCacheStore;
#[cfg(feature = "redis")]
pub use store::RedisCacheStore;
