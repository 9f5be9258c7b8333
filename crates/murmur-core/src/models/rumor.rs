use nostr_sdk::prelude::*;

/// The fully-unwrapped private message: authoritative content plus the
/// conversation partner derived from its sender/recipient fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rumor {
    /// Id of the outer envelope this rumor arrived in. Thread dedupe key.
    pub envelope_id: EventId,
    /// Who wrote the message (the seal's author, verified to match).
    pub author: PublicKey,
    /// The other party of the conversation: the tagged recipient when the
    /// local identity is the author, the author otherwise. Never the local
    /// identity itself.
    pub partner: PublicKey,
    pub content: String,
    pub created_at: Timestamp,
}

impl Rumor {
    pub fn is_local_author(&self, local: &PublicKey) -> bool {
        self.author == *local
    }
}
