use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComparisonError {
    /// The market-cycle collaborator could not produce a snapshot
    #[error("Market cycle unavailable: {0}")]
    MarketCycleUnavailable(String),

    /// The comparison cache store failed a read, write or delete
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ComparisonError {
    /// Collaborator outages are transient; the caller may retry the comparison.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ComparisonError::MarketCycleUnavailable(_) | ComparisonError::CacheUnavailable(_)
        )
    }
}
