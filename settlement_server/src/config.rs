use std::{env, time::Duration};

use log::*;
use spg_common::{parse_boolean_flag, Secret};

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8460;
const DEFAULT_PAYPAL_API_BASE: &str = "https://api-m.paypal.com";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_POLL_BATCH_SIZE: usize = 100;
const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Optional percentage bonus credited alongside every deposit as a separate `bonus`
    /// transaction. 0 disables the bonus.
    pub deposit_bonus_pct: i64,
    pub paypal: PayPalConfig,
    pub cryptomus: CryptomusConfig,
    pub fawaterk: FawaterkConfig,
    pub one: OneConfig,
    pub poll: PollConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: String::default(),
            deposit_bonus_pct: 0,
            paypal: PayPalConfig::default(),
            cryptomus: CryptomusConfig::default(),
            fawaterk: FawaterkConfig::default(),
            one: OneConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

/// PayPal REST API credentials. The webhook itself only carries a capture id; amounts and statuses
/// are fetched from the API, so these credentials are required for PayPal settlements to work at
/// all.
#[derive(Clone, Debug, Default)]
pub struct PayPalConfig {
    /// Base URL of the PayPal REST API. Only overridden in tests and sandbox deployments.
    pub api_base: String,
    pub client_id: String,
    pub secret: Secret<String>,
}

#[derive(Clone, Debug, Default)]
pub struct CryptomusConfig {
    pub api_key: Secret<String>,
}

#[derive(Clone, Debug, Default)]
pub struct FawaterkConfig {
    pub vendor_secret: Secret<String>,
}

#[derive(Clone, Debug, Default)]
pub struct OneConfig {
    pub webhook_secret: Secret<String>,
}

/// Settings for the provider status polling worker.
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// When false, the scheduled worker does not run; `POST /sync` still works.
    pub enabled: bool,
    pub interval: Duration,
    /// Maximum number of orders examined per run.
    pub batch_size: usize,
    /// Per-provider request timeout. A stalled provider fails its own batch and nothing else.
    pub provider_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_POLL_BATCH_SIZE,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env::var("SPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let deposit_bonus_pct = env::var("SPG_DEPOSIT_BONUS_PCT")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for SPG_DEPOSIT_BONUS_PCT. {e}"))
                    .ok()
            })
            .unwrap_or(0);
        Self {
            host,
            port,
            database_url,
            deposit_bonus_pct,
            paypal: PayPalConfig::from_env_or_default(),
            cryptomus: CryptomusConfig::from_env_or_default(),
            fawaterk: FawaterkConfig::from_env_or_default(),
            one: OneConfig::from_env_or_default(),
            poll: PollConfig::from_env_or_default(),
        }
    }
}

impl PayPalConfig {
    pub fn from_env_or_default() -> Self {
        let api_base = env::var("SPG_PAYPAL_API_BASE").ok().unwrap_or_else(|| DEFAULT_PAYPAL_API_BASE.into());
        let client_id = env::var("SPG_PAYPAL_CLIENT_ID").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_PAYPAL_CLIENT_ID is not set. PayPal settlements will be rejected.");
            String::default()
        });
        let secret = env::var("SPG_PAYPAL_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_PAYPAL_SECRET is not set. PayPal settlements will be rejected.");
            String::default()
        });
        Self { api_base, client_id, secret: Secret::new(secret) }
    }
}

impl CryptomusConfig {
    pub fn from_env_or_default() -> Self {
        let api_key = env::var("SPG_CRYPTOMUS_API_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_CRYPTOMUS_API_KEY is not set. Cryptomus webhook signatures cannot be verified.");
            String::default()
        });
        Self { api_key: Secret::new(api_key) }
    }
}

impl FawaterkConfig {
    pub fn from_env_or_default() -> Self {
        let vendor_secret = env::var("SPG_FAWATERK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_FAWATERK_SECRET is not set. Fawaterk webhook signatures cannot be verified.");
            String::default()
        });
        Self { vendor_secret: Secret::new(vendor_secret) }
    }
}

impl OneConfig {
    pub fn from_env_or_default() -> Self {
        let webhook_secret = env::var("SPG_ONE_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_ONE_WEBHOOK_SECRET is not set. ONE webhook signatures cannot be verified.");
            String::default()
        });
        Self { webhook_secret: Secret::new(webhook_secret) }
    }
}

impl PollConfig {
    pub fn from_env_or_default() -> Self {
        let enabled = parse_boolean_flag(env::var("SPG_POLL_ENABLED").ok(), true);
        let interval = env::var("SPG_POLL_INTERVAL_SECS")
            .map_err(|_| {
                info!(
                    "🪛️ SPG_POLL_INTERVAL_SECS is not set. Using the default value of {}s.",
                    DEFAULT_POLL_INTERVAL.as_secs()
                )
            })
            .and_then(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for SPG_POLL_INTERVAL_SECS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let batch_size = env::var("SPG_POLL_BATCH_SIZE")
            .ok()
            .and_then(|s| {
                s.parse::<usize>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for SPG_POLL_BATCH_SIZE. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_POLL_BATCH_SIZE);
        let provider_timeout = env::var("SPG_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for SPG_PROVIDER_TIMEOUT_SECS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT);
        Self { enabled, interval, batch_size, provider_timeout }
    }
}
