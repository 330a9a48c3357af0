use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use log::{debug, trace, warn};
use tokio::sync::RwLock;

use crate::{
    pricing::{errors::PriceResolutionError, PricingConfig},
    traits::PricingSource,
};

/// Injectable time source so that tests can control cache staleness deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CachedConfig {
    fetched_at: DateTime<Utc>,
    config: Arc<PricingConfig>,
}

/// A short-TTL read-through cache in front of the pricing-configuration source. The source is eventually consistent
/// with its own backing store; the TTL bounds both read load and staleness.
pub struct PricingCache<P> {
    source: P,
    ttl: Duration,
    fetch_timeout: StdDuration,
    clock: Arc<dyn Clock>,
    cached: RwLock<Option<CachedConfig>>,
}

impl<P> PricingCache<P>
where P: PricingSource
{
    pub fn new(source: P, ttl: Duration, fetch_timeout: StdDuration) -> Self {
        Self::with_clock(source, ttl, fetch_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(source: P, ttl: Duration, fetch_timeout: StdDuration, clock: Arc<dyn Clock>) -> Self {
        Self { source, ttl, fetch_timeout, clock, cached: RwLock::new(None) }
    }

    /// Returns the active pricing configuration, fetching from the source when the cached copy is missing or older
    /// than the TTL. A fetch that exceeds the configured timeout surfaces as
    /// [`PriceResolutionError::ConfigUnavailable`] rather than hanging the event.
    pub async fn active_config(&self) -> Result<Arc<PricingConfig>, PriceResolutionError> {
        let now = self.clock.now();
        {
            let guard = self.cached.read().await;
            if let Some(entry) = guard.as_ref() {
                if now - entry.fetched_at < self.ttl {
                    trace!("💵️ Pricing config {} served from cache", entry.config.version);
                    return Ok(Arc::clone(&entry.config));
                }
            }
        }
        let fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch_active_config())
            .await
            .map_err(|_| {
                warn!("💵️ Pricing config fetch timed out after {:?}", self.fetch_timeout);
                PriceResolutionError::ConfigUnavailable(format!("fetch timed out after {:?}", self.fetch_timeout))
            })?
            .map_err(|e| PriceResolutionError::ConfigUnavailable(e.to_string()))?;
        let config = Arc::new(fetched);
        debug!("💵️ Pricing config {} fetched and cached", config.version);
        let mut guard = self.cached.write().await;
        *guard = Some(CachedConfig { fetched_at: now, config: Arc::clone(&config) });
        Ok(config)
    }

    /// Drops the cached copy so the next read goes back to the source.
    pub async fn invalidate(&self) {
        let mut guard = self.cached.write().await;
        *guard = None;
    }
}
