//! Relay URL validation and list building.

use nostr_sdk::prelude::*;

use crate::config::RelayConfig;
use crate::error::TransportError;

/// Validate a relay URL.
/// Rules:
/// - Must be `wss://` (secure WebSocket)
/// - Exclude `.onion` (not reachable without Tor)
/// - Exclude `localhost`/`127.0.0.1` unless explicitly allowed
pub fn is_valid_relay_url(url: &str, allow_localhost: bool) -> bool {
    if RelayUrl::parse(url).is_err() {
        return false;
    }

    let Some(rest) = url.strip_prefix("wss://") else {
        return false;
    };
    let host = rest.split(['/', ':']).next().unwrap_or("");

    if host.is_empty() || host.ends_with(".onion") {
        return false;
    }
    if (host == "localhost" || host == "127.0.0.1") && !allow_localhost {
        return false;
    }

    true
}

/// Build the full relay list: primary + fallbacks, deduped, invalid URLs
/// dropped. Falls back to the configured primary when nothing survives.
pub fn build_relay_list(config: &RelayConfig) -> Vec<String> {
    let mut relays: Vec<String> = Vec::new();
    for url in std::iter::once(&config.default_relay).chain(config.fallback_relays.iter()) {
        if is_valid_relay_url(url, config.allow_localhost) && !relays.contains(url) {
            relays.push(url.clone());
        }
    }

    if relays.is_empty() {
        vec![config.default_relay.clone()]
    } else {
        relays
    }
}

/// Parse a relay URL string into a `RelayUrl`.
pub fn parse_relay_url(url: &str) -> Result<RelayUrl, TransportError> {
    RelayUrl::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))
}
