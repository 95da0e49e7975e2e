//! Fund Scoring Module
//!
//! Stateless scoring primitives for mutual fund comparison: trailing-return
//! momentum, portfolio quality, expense efficiency and the market-cycle
//! category weights.

pub mod performance;
pub mod scoring;

pub use performance::{analyze_recent_performance, RecentPerformance};
pub use scoring::{
    calculate_expense_score, calculate_portfolio_score, get_market_cycle_weight,
    get_recommendation, CompositeWeights,
};
