use async_trait::async_trait;
use nostr_sdk::nips::nip44;
use nostr_sdk::prelude::*;

use crate::error::CipherError;

/// The injected cryptographic capability.
///
/// Both layers of the wrap/seal scheme go through this seam, so a device
/// whose keys live behind a hardware store (or a remote signer) can supply
/// its own implementation. Absence of cryptographic support is therefore a
/// missing constructor argument, not a branch to skip at call time.
///
/// `owner` is the identity whose secret participates in the conversation
/// key: the local identity when unwrapping, a one-time key when building
/// the outer layer of an outgoing wrap.
#[async_trait]
pub trait MessageCipher: Send + Sync {
    async fn encrypt(
        &self,
        owner: &Keys,
        peer: &PublicKey,
        plaintext: &str,
    ) -> Result<String, CipherError>;

    async fn decrypt(
        &self,
        owner: &Keys,
        peer: &PublicKey,
        ciphertext: &str,
    ) -> Result<String, CipherError>;
}

/// Production cipher: NIP-44 v2 via the in-process secret key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nip44Cipher;

#[async_trait]
impl MessageCipher for Nip44Cipher {
    async fn encrypt(
        &self,
        owner: &Keys,
        peer: &PublicKey,
        plaintext: &str,
    ) -> Result<String, CipherError> {
        nip44::encrypt(owner.secret_key(), peer, plaintext, nip44::Version::default())
            .map_err(CipherError::new)
    }

    async fn decrypt(
        &self,
        owner: &Keys,
        peer: &PublicKey,
        ciphertext: &str,
    ) -> Result<String, CipherError> {
        nip44::decrypt(owner.secret_key(), peer, ciphertext).map_err(CipherError::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip() {
        let cipher = Nip44Cipher;
        let alice = Keys::generate();
        let bob = Keys::generate();

        let ciphertext = cipher
            .encrypt(&alice, &bob.public_key(), "やあ")
            .await
            .unwrap();
        let plaintext = cipher
            .decrypt(&bob, &alice.public_key(), &ciphertext)
            .await
            .unwrap();

        assert_eq!(plaintext, "やあ");
    }

    #[tokio::test]
    async fn wrong_key_fails() {
        let cipher = Nip44Cipher;
        let alice = Keys::generate();
        let bob = Keys::generate();
        let eve = Keys::generate();

        let ciphertext = cipher
            .encrypt(&alice, &bob.public_key(), "secret")
            .await
            .unwrap();

        assert!(cipher
            .decrypt(&eve, &alice.public_key(), &ciphertext)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn malformed_payload_fails() {
        let cipher = Nip44Cipher;
        let alice = Keys::generate();
        let bob = Keys::generate();

        assert!(cipher
            .decrypt(&bob, &alice.public_key(), "not a nip44 payload")
            .await
            .is_err());
    }
}
