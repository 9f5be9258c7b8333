//! Conversation aggregator: the single owner of the partner-keyed
//! conversation index and the currently-open thread.
//!
//! Folds are purely in-memory and idempotent: re-running a refresh against
//! a superset of previously-seen envelopes leaves already-applied rumors
//! unchanged. Display order is always by message timestamp, never by
//! completion order: every thread mutation re-sorts (stably) before
//! publishing a snapshot to watchers.

use std::collections::{HashMap, HashSet};

use nostr_sdk::prelude::*;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{ConversationSummary, DeliveryState, Rumor, ThreadMessage};

pub struct ConversationStore {
    local: PublicKey,
    index: HashMap<PublicKey, ConversationSummary>,
    open: Option<OpenThread>,
}

struct OpenThread {
    partner: PublicKey,
    messages: Vec<ThreadMessage>,
    /// Message ids already folded: envelope ids (hex) for network messages,
    /// uuids for optimistic sends. Keyed on envelope identity, not content;
    /// two distinct messages may share text and timestamp.
    seen: HashSet<String>,
    tx: watch::Sender<Vec<ThreadMessage>>,
}

impl OpenThread {
    fn new(partner: PublicKey) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            partner,
            messages: Vec::new(),
            seen: HashSet::new(),
            tx,
        }
    }

    fn publish(&mut self) {
        // Stable sort: same-timestamp messages keep insertion order.
        self.messages.sort_by_key(|m| m.created_at);
        self.tx.send_replace(self.messages.clone());
    }
}

impl ConversationStore {
    pub fn new(local: PublicKey) -> Self {
        Self {
            local,
            index: HashMap::new(),
            open: None,
        }
    }

    pub fn local_pubkey(&self) -> PublicKey {
        self.local
    }

    /// Fold one decrypted rumor into both views: the conversation index,
    /// and the open thread when the partner matches.
    pub fn fold_rumor(&mut self, rumor: &Rumor) {
        if rumor.partner == self.local {
            // Protocol noise, not an actionable failure.
            tracing::debug!("discarding self-addressed rumor");
            return;
        }
        self.fold_into_index(rumor);
        self.fold_into_thread(rumor);
    }

    /// Upsert the partner's summary. Last-write-wins by message time, not by
    /// arrival order: an out-of-order-arriving but chronologically older
    /// rumor never overwrites a newer summary.
    fn fold_into_index(&mut self, rumor: &Rumor) {
        match self.index.get_mut(&rumor.partner) {
            Some(summary) => {
                if rumor.created_at >= summary.last_timestamp {
                    summary.last_message = rumor.content.clone();
                    summary.last_timestamp = rumor.created_at;
                }
            }
            None => {
                self.index.insert(
                    rumor.partner,
                    ConversationSummary {
                        partner: rumor.partner,
                        last_message: rumor.content.clone(),
                        last_timestamp: rumor.created_at,
                    },
                );
            }
        }
    }

    /// Append the rumor to the open thread as a confirmed message, if the
    /// open thread belongs to its partner and the envelope was not folded
    /// before.
    fn fold_into_thread(&mut self, rumor: &Rumor) {
        let local = self.local;
        let Some(open) = self.open.as_mut() else {
            return;
        };
        if open.partner != rumor.partner {
            return;
        }

        let id = rumor.envelope_id.to_hex();
        if !open.seen.insert(id.clone()) {
            return;
        }

        open.messages.push(ThreadMessage {
            id,
            content: rumor.content.clone(),
            author: rumor.author,
            created_at: rumor.created_at,
            is_local_author: rumor.author == local,
            delivery: DeliveryState::Confirmed,
        });
        open.publish();
    }

    /// Conversation list for display, most recent first.
    pub fn conversation_index(&self) -> Vec<ConversationSummary> {
        let mut summaries: Vec<ConversationSummary> = self.index.values().cloned().collect();
        summaries.sort_by(|a, b| b.last_timestamp.cmp(&a.last_timestamp));
        summaries
    }

    /// Open (or re-open) the thread for `partner` and subscribe to its
    /// snapshots. The thread starts empty and is rebuilt by the next
    /// refresh; watchers of a previously open thread see their channel
    /// close.
    pub fn open_thread(&mut self, partner: PublicKey) -> watch::Receiver<Vec<ThreadMessage>> {
        match self.open.as_ref() {
            Some(open) if open.partner == partner => open.tx.subscribe(),
            _ => {
                let open = OpenThread::new(partner);
                let rx = open.tx.subscribe();
                self.open = Some(open);
                rx
            }
        }
    }

    pub fn close_thread(&mut self) {
        self.open = None;
    }

    pub fn open_partner(&self) -> Option<PublicKey> {
        self.open.as_ref().map(|o| o.partner)
    }

    /// Current snapshot of the open thread (already time-ordered).
    pub fn thread_messages(&self) -> Vec<ThreadMessage> {
        self.open
            .as_ref()
            .map(|o| o.messages.clone())
            .unwrap_or_default()
    }

    /// Insert an optimistic pending message for a local send. Returns the
    /// generated message id, or `None` when the open thread is for a
    /// different partner (the send still proceeds, it just has no thread
    /// view to appear in).
    pub fn append_pending(
        &mut self,
        partner: PublicKey,
        content: &str,
        created_at: Timestamp,
    ) -> Option<String> {
        let local = self.local;
        let open = self.open.as_mut()?;
        if open.partner != partner {
            return None;
        }

        let id = Uuid::new_v4().to_string();
        open.seen.insert(id.clone());
        open.messages.push(ThreadMessage {
            id: id.clone(),
            content: content.to_string(),
            author: local,
            created_at,
            is_local_author: true,
            delivery: DeliveryState::Pending,
        });
        open.publish();
        Some(id)
    }

    /// Transition a pending message to confirmed, in place: same identity,
    /// not a new entry.
    pub fn confirm_pending(&mut self, message_id: &str) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        if let Some(message) = open.messages.iter_mut().find(|m| m.id == message_id) {
            message.delivery = DeliveryState::Confirmed;
            open.publish();
        }
    }

    /// Roll an optimistic message back out of the thread entirely. The user
    /// retries by resending the same text.
    pub fn remove_pending(&mut self, message_id: &str) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let before = open.messages.len();
        open.messages.retain(|m| m.id != message_id);
        open.seen.remove(message_id);
        if open.messages.len() != before {
            open.publish();
        }
    }

    /// Reflect a successful send in the conversation index immediately, so
    /// the list reorders without waiting for the next fetch cycle.
    pub fn record_sent(&mut self, partner: PublicKey, content: &str, sent_at: Timestamp) {
        let summary = self
            .index
            .entry(partner)
            .or_insert_with(|| ConversationSummary {
                partner,
                last_message: String::new(),
                last_timestamp: Timestamp::from(0),
            });
        if sent_at >= summary.last_timestamp {
            summary.last_message = content.to_string();
            summary.last_timestamp = sent_at;
        }
    }
}
