use thiserror::Error;

/// Why a single envelope was dropped during unwrapping.
///
/// Every variant is terminal for that envelope only; sibling envelopes in the
/// same batch are unaffected. None of these are retried; a cryptographic
/// failure on the same ciphertext cannot succeed on a second attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("outer layer did not decrypt for this identity")]
    OuterDecryptFailed,

    #[error("decrypted payload is not a valid seal")]
    InvalidSeal,

    #[error("seal contents did not decrypt")]
    InnerDecryptFailed,

    #[error("seal did not contain a valid private message")]
    InvalidRumor,

    #[error("message is addressed to its own author")]
    SelfAddressed,
}

/// Opaque failure from the injected cryptographic capability.
///
/// The capability reports no structure beyond "it did not work": key
/// mismatch and malformed input are indistinguishable to callers.
#[derive(Debug, Clone, Error)]
#[error("cipher failure: {0}")]
pub struct CipherError(String);

impl CipherError {
    pub fn new(detail: impl std::fmt::Display) -> Self {
        Self(detail.to_string())
    }
}

/// Failure while assembling the outgoing seal/wrap layers.
#[derive(Debug, Error)]
pub enum WrapError {
    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("signing failed: {0}")]
    Sign(String),

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of a relay-side operation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    #[error("relay fetch failed: {0}")]
    Fetch(String),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Outcome of a failed send. The optimistic thread entry has already been
/// rolled back by the time one of these reaches the caller; retrying is a
/// user action (resend the same text), never automatic.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Wrap(#[from] WrapError),

    #[error("publish failed: {0}")]
    Publish(#[from] TransportError),

    #[error("publish timed out")]
    Timeout,

    #[error("send cancelled")]
    Cancelled,
}

/// Whole-attempt failure of a reconstruction pass. Surfaced once per
/// refresh, never per envelope.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}
