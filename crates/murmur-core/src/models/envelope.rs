use nostr_sdk::prelude::*;

/// Outermost encrypted transport unit: a kind-1059 wrap addressed to the
/// local identity. Sourced from the network, consumed once by the unwrapper,
/// then discarded.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Outer event id. Per-thread dedupe downstream is keyed on this,
    /// not on the decrypted content.
    pub id: EventId,
    /// One-time key the wrap was signed with; counterparty for the outer
    /// decrypt. Says nothing about who actually wrote the message.
    pub sender: PublicKey,
    /// The encrypted seal
    pub ciphertext: String,
    /// Substituted for the rumor's `created_at` when the rumor lacks one,
    /// so every accepted message stays orderable.
    pub fallback_timestamp: Timestamp,
}

impl Envelope {
    /// Build from a relay event. Returns `None` for anything that is not a
    /// gift wrap.
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::GiftWrap {
            return None;
        }

        Some(Self {
            id: event.id,
            sender: event.pubkey,
            ciphertext: event.content.clone(),
            fallback_timestamp: event.created_at,
        })
    }
}
