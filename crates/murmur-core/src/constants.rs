//! Application-wide constants
//!
//! Centralized location for magic values used across multiple modules.

/// Default Nostr relay URL
pub const RELAY_URL: &str = "wss://yabu.me";

/// Fallback relays when the primary is unreachable
pub const FALLBACK_RELAYS: &[&str] = &[
    "wss://relay-jp.nostr.wirednet.jp",
    "wss://r.kojira.io",
    "wss://relay.damus.io",
];

/// How many gift-wrapped envelopes a refresh pulls from relays.
/// Conversation state is rebuilt from scratch every session, so this bounds
/// the reconstruction window rather than paginating it.
pub const DEFAULT_FETCH_LIMIT: usize = 100;

/// Bounded fan-out for envelope decryption. The decryption capability may be
/// a single-flight resource (hardware key store); this keeps it from being
/// saturated by an unbounded burst of parallel requests.
pub const DEFAULT_DECRYPT_CONCURRENCY: usize = 5;

/// Relay fetch timeout in seconds
pub const FETCH_TIMEOUT_SECS: u64 = 15;

/// Publish timeout in seconds. A timeout is treated identically to a
/// publish rejection.
pub const PUBLISH_TIMEOUT_SECS: u64 = 10;
