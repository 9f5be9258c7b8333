//! Network boundary: fetching gift-wrapped envelopes and publishing signed
//! events. The engine only sees this trait; the relay-backed implementation
//! lives behind it.

use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::prelude::*;

use crate::config::CoreConfig;
use crate::error::TransportError;
use crate::models::Envelope;
use crate::relay::{build_relay_list, parse_relay_url};

/// Read/publish access to the envelope source. Fetch may return fewer than
/// `limit` envelopes and guarantees no ordering; publish success means "at
/// least one relay accepted", nothing stronger.
#[async_trait]
pub trait EnvelopeTransport: Send + Sync {
    async fn fetch_envelopes(
        &self,
        recipient: PublicKey,
        since: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Envelope>, TransportError>;

    async fn publish(&self, event: Event) -> Result<(), TransportError>;
}

/// Filter for gift wraps addressed to `recipient`. `since` is the optional
/// reconstruction cursor; the engine passes `None` and rebuilds from
/// scratch.
pub fn envelope_filter(recipient: PublicKey, since: Option<Timestamp>, limit: usize) -> Filter {
    let mut filter = Filter::new()
        .kind(Kind::GiftWrap)
        .pubkey(recipient)
        .limit(limit);
    if let Some(since) = since {
        filter = filter.since(since);
    }
    filter
}

/// Relay-backed transport over the nostr-sdk client pool.
pub struct RelayTransport {
    client: Client,
    fetch_timeout: Duration,
}

impl RelayTransport {
    /// Connect to the configured relay set. Invalid URLs are dropped before
    /// connecting; at least one syntactically valid relay is required.
    pub async fn connect(config: &CoreConfig) -> Result<Self, TransportError> {
        let client = Client::default();

        let mut added = 0;
        for url in build_relay_list(&config.relay) {
            let relay_url = parse_relay_url(&url)?;
            if client.add_relay(relay_url).await.is_ok() {
                added += 1;
            }
        }
        if added == 0 {
            return Err(TransportError::InvalidUrl(
                "no usable relay in configuration".to_string(),
            ));
        }

        client.connect().await;
        tracing::info!(relays = added, "connected to relay pool");

        Ok(Self {
            client,
            fetch_timeout: config.fetch_timeout,
        })
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}

#[async_trait]
impl EnvelopeTransport for RelayTransport {
    async fn fetch_envelopes(
        &self,
        recipient: PublicKey,
        since: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Envelope>, TransportError> {
        let filter = envelope_filter(recipient, since, limit);
        let events = self
            .client
            .fetch_events(filter, self.fetch_timeout)
            .await
            .map_err(|e| TransportError::Fetch(e.to_string()))?;

        Ok(events
            .into_iter()
            .filter_map(|e| Envelope::from_event(&e))
            .collect())
    }

    async fn publish(&self, event: Event) -> Result<(), TransportError> {
        let output = self
            .client
            .send_event(&event)
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        if output.success.is_empty() {
            let reasons: Vec<String> = output
                .failed
                .values()
                .map(|reason| reason.to_string())
                .collect();
            let summary = if reasons.is_empty() {
                "no relay accepted the event".to_string()
            } else {
                reasons.join("; ")
            };
            return Err(TransportError::Rejected(summary));
        }

        tracing::debug!(
            event_id = %event.id,
            accepted = output.success.len(),
            "published event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_targets_wraps_for_recipient() {
        let recipient = Keys::generate().public_key();
        let filter = envelope_filter(recipient, None, 50);

        assert_eq!(filter.kinds, Some([Kind::GiftWrap].into_iter().collect()));
        assert_eq!(filter.limit, Some(50));
        assert!(filter.since.is_none());
    }

    #[test]
    fn filter_carries_cursor_when_given() {
        let recipient = Keys::generate().public_key();
        let filter = envelope_filter(recipient, Some(Timestamp::from(1_700_000_000)), 10);

        assert_eq!(filter.since, Some(Timestamp::from(1_700_000_000)));
    }
}
