//! Outbox coordinator: optimistic local append of an outgoing message,
//! encrypt+publish dispatch, and reconciliation.
//!
//! The pending thread entry appears before any network round-trip. A
//! successful publish confirms that exact entry in place and bumps the
//! conversation index; any failure (rejection, timeout, cancellation)
//! removes the entry entirely so the user can retry by resending.

use std::time::Duration;

use nostr_sdk::prelude::*;
use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::error::SendError;
use crate::models::DeliveryState;
use crate::nostr::cipher::MessageCipher;
use crate::nostr::wrap::build_gift_wraps;
use crate::store::ConversationStore;
use crate::transport::EnvelopeTransport;

/// What a resolved send looks like to the caller.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Thread entry id, when the thread for this partner was open.
    pub message_id: Option<String>,
    /// Id of the wrap the network accepted.
    pub wrap_id: EventId,
    pub delivery: DeliveryState,
}

pub async fn send_message(
    store: &Mutex<ConversationStore>,
    transport: &dyn EnvelopeTransport,
    cipher: &dyn MessageCipher,
    local: &Keys,
    partner: PublicKey,
    content: &str,
    publish_timeout: Duration,
    cancel: &CancelToken,
) -> Result<SendReceipt, SendError> {
    let sent_at = Timestamp::now();
    let pending_id = store.lock().append_pending(partner, content, sent_at);

    let result = dispatch(
        transport,
        cipher,
        local,
        partner,
        content,
        sent_at,
        publish_timeout,
        cancel,
    )
    .await;

    match result {
        Ok(wrap_id) => {
            let mut store = store.lock();
            if let Some(id) = pending_id.as_deref() {
                store.confirm_pending(id);
            }
            store.record_sent(partner, content, sent_at);
            Ok(SendReceipt {
                message_id: pending_id,
                wrap_id,
                delivery: DeliveryState::Confirmed,
            })
        }
        Err(e) => {
            if let Some(id) = pending_id.as_deref() {
                store.lock().remove_pending(id);
            }
            Err(e)
        }
    }
}

/// Encrypt and publish, without touching the store. Returns the accepted
/// wrap's id.
#[allow(clippy::too_many_arguments)]
async fn dispatch(
    transport: &dyn EnvelopeTransport,
    cipher: &dyn MessageCipher,
    local: &Keys,
    partner: PublicKey,
    content: &str,
    sent_at: Timestamp,
    publish_timeout: Duration,
    cancel: &CancelToken,
) -> Result<EventId, SendError> {
    let wraps = build_gift_wraps(local, partner, content, sent_at, cipher).await?;
    let wrap_id = wraps.to_partner.id;

    tokio::select! {
        published = tokio::time::timeout(publish_timeout, transport.publish(wraps.to_partner)) => {
            match published {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(SendError::Publish(e)),
                Err(_) => return Err(SendError::Timeout),
            }
        }
        _ = cancel.cancelled() => return Err(SendError::Cancelled),
    }

    // Best-effort copy to ourselves so the message survives the next
    // rebuild. Its failure does not affect the send outcome.
    match tokio::time::timeout(publish_timeout, transport.publish(wraps.to_self)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "self-copy publish failed"),
        Err(_) => tracing::debug!("self-copy publish timed out"),
    }

    Ok(wrap_id)
}
