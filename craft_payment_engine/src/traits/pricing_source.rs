use thiserror::Error;

use crate::pricing::PricingConfig;

/// Read-only fetch of the active pricing-configuration rule set. The engine treats the source as eventually
/// consistent and caches results behind [`crate::pricing::PricingCache`].
#[allow(async_fn_in_trait)]
pub trait PricingSource: Send + Sync {
    async fn fetch_active_config(&self) -> Result<PricingConfig, PricingSourceError>;
}

#[derive(Debug, Clone, Error)]
pub enum PricingSourceError {
    #[error("Could not fetch the pricing configuration. {0}")]
    FetchFailed(String),
    #[error("No pricing configuration is active for the current time")]
    NoActiveConfig,
}

impl From<sqlx::Error> for PricingSourceError {
    fn from(e: sqlx::Error) -> Self {
        PricingSourceError::FetchFailed(e.to_string())
    }
}
