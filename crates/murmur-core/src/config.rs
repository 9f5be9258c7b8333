use std::time::Duration;

use crate::constants::{
    DEFAULT_DECRYPT_CONCURRENCY, DEFAULT_FETCH_LIMIT, FALLBACK_RELAYS, FETCH_TIMEOUT_SECS,
    PUBLISH_TIMEOUT_SECS, RELAY_URL,
};

/// Full configuration for the conversation engine.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub relay: RelayConfig,
    /// Max envelopes pulled per refresh
    pub fetch_limit: usize,
    /// Worker pool size for the decryption fan-out
    pub decrypt_concurrency: usize,
    /// Relay fetch timeout
    pub fetch_timeout: Duration,
    /// Publish timeout; expiry is treated as a publish failure
    pub publish_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            decrypt_concurrency: DEFAULT_DECRYPT_CONCURRENCY,
            fetch_timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
            publish_timeout: Duration::from_secs(PUBLISH_TIMEOUT_SECS),
        }
    }
}

/// Relay connection settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Primary relay URL
    pub default_relay: String,
    /// Fallback relays when primary fails
    pub fallback_relays: Vec<String>,
    /// Accept `wss://localhost` relays (dev mode only)
    pub allow_localhost: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_relay: RELAY_URL.to_string(),
            fallback_relays: FALLBACK_RELAYS.iter().map(|s| s.to_string()).collect(),
            allow_localhost: false,
        }
    }
}
