//! # murmur-core: encrypted conversation reconstruction engine
//!
//! Turns unordered batches of double-encrypted envelopes (wrap, then seal,
//! then rumor) into a per-partner conversation model, and appends new
//! messages with optimistic-but-reversible delivery state. Built on
//! **rust-nostr** (`nostr-sdk`) for protocol handling and relay connections.

pub mod cancel;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod models;
pub mod nostr;
pub mod outbox;
pub mod pipeline;
pub mod relay;
pub mod store;
pub mod transport;

pub use cancel::CancelToken;
pub use config::{CoreConfig, RelayConfig};
pub use engine::{ConversationEngine, RefreshStats};
pub use error::{CipherError, CoreError, RejectReason, SendError, TransportError};
pub use models::{ConversationSummary, DeliveryState, Envelope, Rumor, ThreadMessage};
pub use nostr::{MessageCipher, Nip44Cipher};
pub use outbox::SendReceipt;
pub use store::ConversationStore;
pub use transport::{EnvelopeTransport, RelayTransport};
