use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use cpg_common::Secret;
use log::*;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8860;
const DEFAULT_TIMESTAMP_TOLERANCE: Duration = Duration::seconds(300);
const DEFAULT_PRICING_CACHE_TTL: Duration = Duration::seconds(300);
const DEFAULT_PRICING_FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub webhook: WebhookConfig,
    pub pricing: PricingCacheConfig,
}

/// Webhook signature configuration. Multiple signing secrets are supported so that keys can be rotated without a
/// window of rejected deliveries; the order of `CPG_WEBHOOK_SECRETS` is the order they are tried in.
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub secrets: Vec<Secret<String>>,
    pub timestamp_tolerance: Duration,
}

#[derive(Clone, Copy, Debug)]
pub struct PricingCacheConfig {
    pub cache_ttl: Duration,
    pub fetch_timeout: StdDuration,
}

impl Default for PricingCacheConfig {
    fn default() -> Self {
        Self { cache_ttl: DEFAULT_PRICING_CACHE_TTL, fetch_timeout: DEFAULT_PRICING_FETCH_TIMEOUT }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: String::default(),
            webhook: WebhookConfig {
                secrets: Vec::new(),
                timestamp_tolerance: DEFAULT_TIMESTAMP_TOLERANCE,
            },
            pricing: PricingCacheConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env::var("CPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CPG_PORT. {e} Using the default, {DEFAULT_CPG_PORT}, instead."
                    );
                    DEFAULT_CPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CPG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let webhook = WebhookConfig::from_env_or_default();
        let pricing = PricingCacheConfig::from_env_or_default();
        Self { host, port, database_url, webhook, pricing }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let secrets = env::var("CPG_WEBHOOK_SECRETS")
            .map(|s| {
                s.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).map(|s| Secret::new(s.to_string())).collect()
            })
            .unwrap_or_else(|_| {
                error!(
                    "🪛️ CPG_WEBHOOK_SECRETS is not set. Every webhook delivery will be rejected until a signing \
                     secret is configured."
                );
                Vec::new()
            });
        if secrets.len() > 1 {
            info!("🪛️ {} webhook signing secrets configured (rotation mode).", secrets.len());
        }
        let timestamp_tolerance = seconds_from_env("CPG_WEBHOOK_TIMESTAMP_TOLERANCE", DEFAULT_TIMESTAMP_TOLERANCE);
        Self { secrets, timestamp_tolerance }
    }
}

impl PricingCacheConfig {
    pub fn from_env_or_default() -> Self {
        let cache_ttl = seconds_from_env("CPG_PRICING_CACHE_TTL", DEFAULT_PRICING_CACHE_TTL);
        let fetch_timeout = env::var("CPG_PRICING_FETCH_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid value for CPG_PRICING_FETCH_TIMEOUT. {e} Using the default.");
                    })
                    .ok()
            })
            .map(StdDuration::from_secs)
            .unwrap_or(DEFAULT_PRICING_FETCH_TIMEOUT);
        Self { cache_ttl, fetch_timeout }
    }
}

fn seconds_from_env(var: &str, default: Duration) -> Duration {
    match env::var(var) {
        Ok(s) => s.parse::<i64>().map(Duration::seconds).unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid number of seconds for {var}. {e} Using the default.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {var} is not set. Using the default, {}s.", default.num_seconds());
            default
        },
    }
}
