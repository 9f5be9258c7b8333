//! The conversation engine: the entry point tying fetch, decrypt fan-out,
//! aggregation, and sending together behind one handle.
//!
//! Thread-safe (`Send + Sync`), designed to be held behind `Arc` by
//! whatever front-end renders it. Conversation state is memory-resident for
//! the session and rebuilt from the network by `refresh`.

use std::sync::Arc;

use nostr_sdk::prelude::*;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::cancel::CancelToken;
use crate::config::CoreConfig;
use crate::error::{CoreError, SendError};
use crate::models::{ConversationSummary, ThreadMessage};
use crate::nostr::cipher::MessageCipher;
use crate::outbox::{self, SendReceipt};
use crate::pipeline::process_batch;
use crate::store::ConversationStore;
use crate::transport::EnvelopeTransport;

/// Outcome counts of one reconstruction pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshStats {
    pub fetched: usize,
    pub accepted: usize,
    pub rejected: usize,
}

pub struct ConversationEngine {
    local: Keys,
    cipher: Arc<dyn MessageCipher>,
    transport: Arc<dyn EnvelopeTransport>,
    store: Mutex<ConversationStore>,
    config: CoreConfig,
}

impl ConversationEngine {
    pub fn new(
        local: Keys,
        cipher: Arc<dyn MessageCipher>,
        transport: Arc<dyn EnvelopeTransport>,
        config: CoreConfig,
    ) -> Self {
        let store = Mutex::new(ConversationStore::new(local.public_key()));
        Self {
            local,
            cipher,
            transport,
            store,
            config,
        }
    }

    pub fn local_pubkey(&self) -> PublicKey {
        self.local.public_key()
    }

    /// Rebuild conversation state from the network: fetch the envelope
    /// batch, fan it out for decryption, and fold results as they arrive so
    /// watchers see progressive updates.
    ///
    /// Per-envelope failures are counted and logged, never fatal; only a
    /// transport-level fetch failure aborts the pass. A cancelled refresh
    /// stops folding and leaves already-folded state intact.
    pub async fn refresh(&self, cancel: &CancelToken) -> Result<RefreshStats, CoreError> {
        let envelopes = self
            .transport
            .fetch_envelopes(self.local.public_key(), None, self.config.fetch_limit)
            .await?;

        let mut stats = RefreshStats {
            fetched: envelopes.len(),
            ..Default::default()
        };

        let mut results = process_batch(
            envelopes,
            self.local.clone(),
            self.cipher.clone(),
            self.config.decrypt_concurrency,
            cancel.clone(),
        );

        while let Some(item) = results.recv().await {
            if cancel.is_cancelled() {
                break;
            }
            match item.result {
                Ok(rumor) => {
                    self.store.lock().fold_rumor(&rumor);
                    stats.accepted += 1;
                }
                Err(reason) => {
                    tracing::debug!(envelope_id = %item.envelope.id, %reason, "envelope rejected");
                    stats.rejected += 1;
                }
            }
        }

        tracing::info!(
            fetched = stats.fetched,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "conversation refresh complete"
        );
        Ok(stats)
    }

    /// Conversation list, most recently active first.
    pub fn conversation_index(&self) -> Vec<ConversationSummary> {
        self.store.lock().conversation_index()
    }

    /// Open the thread for `partner` and subscribe to its time-ordered
    /// snapshots. Call `refresh` afterwards to populate it.
    pub fn open_thread(&self, partner: PublicKey) -> watch::Receiver<Vec<ThreadMessage>> {
        self.store.lock().open_thread(partner)
    }

    pub fn close_thread(&self) {
        self.store.lock().close_thread();
    }

    /// Current snapshot of the open thread.
    pub fn thread_messages(&self) -> Vec<ThreadMessage> {
        self.store.lock().thread_messages()
    }

    /// Send a message to `partner`, per the outbox contract: pending entry
    /// immediately, confirmed in place on publish success, removed entirely
    /// on failure.
    pub async fn send_message(
        &self,
        partner: PublicKey,
        content: &str,
        cancel: &CancelToken,
    ) -> Result<SendReceipt, SendError> {
        outbox::send_message(
            &self.store,
            self.transport.as_ref(),
            self.cipher.as_ref(),
            &self.local,
            partner,
            content,
            self.config.publish_timeout,
            cancel,
        )
        .await
    }
}
