use nostr_sdk::prelude::*;
use serde::Serialize;

/// Delivery status of a thread message.
///
/// Network-derived messages are born `Confirmed` (the relay already accepted
/// them). Local sends are born `Pending` and resolve exactly once: to
/// `Confirmed` in place, or to `Failed`, in which case the entry is removed
/// from the thread and the state only survives in the send receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Confirmed,
    Failed,
}

/// One row of the conversation list: the latest message per partner.
///
/// Superseded, never merged: `last_timestamp` reflects the maximum seen and
/// `last_message` the text at that maximum.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub partner: PublicKey,
    pub last_message: String,
    pub last_timestamp: Timestamp,
}

/// One message of an open thread, ordered by `created_at` ascending with
/// arrival order breaking ties.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadMessage {
    /// Envelope event id (hex) for network messages, a locally generated
    /// uuid for optimistic sends.
    pub id: String,
    pub content: String,
    pub author: PublicKey,
    pub created_at: Timestamp,
    pub is_local_author: bool,
    pub delivery: DeliveryState,
}
