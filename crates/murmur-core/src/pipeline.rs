//! Batch decryption scheduler: fans a batch of envelopes out to the
//! unwrapper with bounded concurrency and streams per-envelope outcomes
//! back as they complete.
//!
//! Emission order follows completion, not input order; consumers that need
//! chronological order sort downstream on the rumor timestamps. One
//! envelope's failure never cancels or retries its siblings.

use std::sync::Arc;

use futures::StreamExt;
use nostr_sdk::prelude::*;
use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::error::RejectReason;
use crate::models::{Envelope, Rumor};
use crate::nostr::cipher::MessageCipher;
use crate::nostr::wrap::unwrap_envelope;

/// One envelope's outcome, surfaced whether it unwrapped or not so the
/// consumer can log rejections.
#[derive(Debug)]
pub struct BatchItem {
    pub envelope: Envelope,
    pub result: Result<Rumor, RejectReason>,
}

/// Fan `envelopes` out across at most `concurrency` in-flight decrypts and
/// return the receiving end of the result stream.
///
/// Results arrive as soon as each envelope finishes, so the consumer can
/// fold partial progress instead of waiting for the whole batch. The
/// channel is bounded to `concurrency`, which also bounds how far the
/// decrypt side can run ahead of a slow consumer. The spawned work stops
/// early when `cancel` fires or the receiver is dropped.
pub fn process_batch(
    envelopes: Vec<Envelope>,
    local: Keys,
    cipher: Arc<dyn MessageCipher>,
    concurrency: usize,
    cancel: CancelToken,
) -> mpsc::Receiver<BatchItem> {
    let concurrency = concurrency.max(1);
    let (tx, rx) = mpsc::channel(concurrency);

    tokio::spawn(async move {
        let workers = futures::stream::iter(envelopes).for_each_concurrent(
            concurrency,
            |envelope| {
                let tx = tx.clone();
                let local = local.clone();
                let cipher = cipher.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() || tx.is_closed() {
                        return;
                    }
                    let result = unwrap_envelope(&envelope, &local, cipher.as_ref()).await;
                    let _ = tx.send(BatchItem { envelope, result }).await;
                }
            },
        );

        tokio::select! {
            _ = workers => {}
            _ = cancel.cancelled() => {
                tracing::debug!("decrypt batch cancelled");
            }
        }
    });

    rx
}
