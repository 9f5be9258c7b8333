//! Two-layer wrap/seal codec: unwrapping inbound envelopes and assembling
//! outgoing ones.
//!
//! Unwrapping is a pure sequential pipeline (outer decrypt, seal checks,
//! inner decrypt, rumor checks, partner derivation) where every failure is
//! an expected, per-envelope outcome: a shared inbox is full of wraps that
//! do not belong to this conversation. Rejections are values, not panics.

use nostr_sdk::nips::nip59;
use nostr_sdk::prelude::*;

use crate::error::{RejectReason, WrapError};
use crate::models::{Envelope, Rumor};
use crate::nostr::cipher::MessageCipher;

/// Unwrap one envelope down to its rumor.
///
/// Deterministic given the same inputs and cipher behavior; no side effects.
/// A `RejectReason` never aborts sibling envelopes.
pub async fn unwrap_envelope(
    envelope: &Envelope,
    local: &Keys,
    cipher: &dyn MessageCipher,
) -> Result<Rumor, RejectReason> {
    // Outer layer: conversation key between the local identity and the
    // wrap's one-time sender key.
    let seal_json = cipher
        .decrypt(local, &envelope.sender, &envelope.ciphertext)
        .await
        .map_err(|_| RejectReason::OuterDecryptFailed)?;

    let seal = Event::from_json(&seal_json).map_err(|_| RejectReason::InvalidSeal)?;
    if seal.kind != Kind::Seal {
        return Err(RejectReason::InvalidSeal);
    }
    // The seal names the true sender; an unverifiable signature makes that
    // claim worthless.
    if seal.verify().is_err() {
        return Err(RejectReason::InvalidSeal);
    }

    // Inner layer: conversation key between the local identity and the
    // seal's author.
    let rumor_json = cipher
        .decrypt(local, &seal.pubkey, &seal.content)
        .await
        .map_err(|_| RejectReason::InnerDecryptFailed)?;

    parse_rumor(&rumor_json, envelope, &seal.pubkey, &local.public_key())
}

/// Parse the innermost plaintext and derive the conversation partner.
///
/// The rumor is parsed leniently (a missing `created_at` falls back to the
/// envelope timestamp) but its kind, author, and addressing must all hold.
fn parse_rumor(
    rumor_json: &str,
    envelope: &Envelope,
    seal_author: &PublicKey,
    local: &PublicKey,
) -> Result<Rumor, RejectReason> {
    let raw: serde_json::Value =
        serde_json::from_str(rumor_json).map_err(|_| RejectReason::InvalidRumor)?;

    let kind = raw.get("kind").and_then(|v| v.as_u64());
    if kind != Some(u64::from(Kind::PrivateDirectMessage.as_u16())) {
        return Err(RejectReason::InvalidRumor);
    }

    let author = raw
        .get("pubkey")
        .and_then(|v| v.as_str())
        .and_then(|s| PublicKey::from_hex(s).ok())
        .ok_or(RejectReason::InvalidRumor)?;

    // A rumor whose author differs from the seal's author is unattributable:
    // the seal signature vouches for its own key only.
    if author != *seal_author {
        return Err(RejectReason::InvalidRumor);
    }

    let content = raw
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let created_at = raw
        .get("created_at")
        .and_then(|v| v.as_u64())
        .map(Timestamp::from)
        .unwrap_or(envelope.fallback_timestamp);

    // Partner = whichever identity is not the local user. For our own sent
    // messages (fetched back from the self-addressed copy) that is the
    // tagged recipient.
    let partner = if author == *local {
        first_p_tag(&raw).ok_or(RejectReason::InvalidRumor)?
    } else {
        author
    };

    if partner == *local {
        return Err(RejectReason::SelfAddressed);
    }

    Ok(Rumor {
        envelope_id: envelope.id,
        author,
        partner,
        content,
        created_at,
    })
}

fn first_p_tag(raw: &serde_json::Value) -> Option<PublicKey> {
    raw.get("tags")?.as_array()?.iter().find_map(|tag| {
        let tag = tag.as_array()?;
        if tag.first()?.as_str()? == "p" {
            PublicKey::from_hex(tag.get(1)?.as_str()?).ok()
        } else {
            None
        }
    })
}

/// The pair of wraps produced for one outgoing message: one addressed to the
/// partner, one to the local identity so the message comes back on the next
/// fetch.
#[derive(Debug, Clone)]
pub struct OutgoingWraps {
    pub to_partner: Event,
    pub to_self: Event,
}

/// Assemble the full wrap/seal/rumor stack for an outgoing message.
///
/// The rumor carries the caller-supplied `created_at` (display time); the
/// seal and wrap timestamps are randomly tweaked into the past so relays
/// learn nothing from them.
pub async fn build_gift_wraps(
    local: &Keys,
    partner: PublicKey,
    content: &str,
    created_at: Timestamp,
    cipher: &dyn MessageCipher,
) -> Result<OutgoingWraps, WrapError> {
    let mut rumor = EventBuilder::new(Kind::PrivateDirectMessage, content)
        .tag(Tag::public_key(partner))
        .custom_created_at(created_at)
        .build(local.public_key());
    rumor.ensure_id();
    let rumor_json = serde_json::to_string(&rumor)?;

    let to_partner = wrap_for(local, &rumor_json, partner, cipher).await?;
    let to_self = wrap_for(local, &rumor_json, local.public_key(), cipher).await?;

    Ok(OutgoingWraps {
        to_partner,
        to_self,
    })
}

/// Seal the rumor for one recipient and wrap the seal under a one-time key.
async fn wrap_for(
    local: &Keys,
    rumor_json: &str,
    recipient: PublicKey,
    cipher: &dyn MessageCipher,
) -> Result<Event, WrapError> {
    let sealed = cipher.encrypt(local, &recipient, rumor_json).await?;
    let seal = EventBuilder::new(Kind::Seal, sealed)
        .custom_created_at(Timestamp::tweaked(nip59::RANGE_RANDOM_TIMESTAMP_TWEAK))
        .sign_with_keys(local)
        .map_err(|e| WrapError::Sign(e.to_string()))?;

    let one_time = Keys::generate();
    let wrapped = cipher
        .encrypt(&one_time, &recipient, &seal.as_json())
        .await?;

    EventBuilder::new(Kind::GiftWrap, wrapped)
        .tag(Tag::public_key(recipient))
        .custom_created_at(Timestamp::tweaked(nip59::RANGE_RANDOM_TIMESTAMP_TWEAK))
        .sign_with_keys(&one_time)
        .map_err(|e| WrapError::Sign(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nostr::cipher::Nip44Cipher;

    fn envelope_from(event: &Event) -> Envelope {
        Envelope::from_event(event).expect("built wraps are gift wraps")
    }

    #[tokio::test]
    async fn unwrap_round_trip_from_partner() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();

        // The partner addresses the local identity.
        let wraps = build_gift_wraps(
            &partner,
            local.public_key(),
            "こんにちは",
            Timestamp::from(1_700_000_000),
            &cipher,
        )
        .await
        .unwrap();

        let envelope = envelope_from(&wraps.to_partner);
        let rumor = unwrap_envelope(&envelope, &local, &cipher).await.unwrap();

        assert_eq!(rumor.author, partner.public_key());
        assert_eq!(rumor.partner, partner.public_key());
        assert_eq!(rumor.content, "こんにちは");
        assert_eq!(rumor.created_at, Timestamp::from(1_700_000_000));
        assert_eq!(rumor.envelope_id, wraps.to_partner.id);
        assert!(!rumor.is_local_author(&local.public_key()));
    }

    #[tokio::test]
    async fn unwrap_self_copy_names_recipient_as_partner() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();

        let wraps = build_gift_wraps(
            &local,
            partner.public_key(),
            "sent by me",
            Timestamp::from(1_700_000_100),
            &cipher,
        )
        .await
        .unwrap();

        let envelope = envelope_from(&wraps.to_self);
        let rumor = unwrap_envelope(&envelope, &local, &cipher).await.unwrap();

        assert_eq!(rumor.author, local.public_key());
        assert_eq!(rumor.partner, partner.public_key());
        assert!(rumor.is_local_author(&local.public_key()));
    }

    #[tokio::test]
    async fn unwrap_rejects_foreign_envelope() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();
        let other = Keys::generate();

        // Addressed to `other`, fetched by `local` anyway.
        let wraps = build_gift_wraps(
            &partner,
            other.public_key(),
            "not for you",
            Timestamp::now(),
            &cipher,
        )
        .await
        .unwrap();

        let envelope = envelope_from(&wraps.to_partner);
        assert_eq!(
            unwrap_envelope(&envelope, &local, &cipher).await,
            Err(RejectReason::OuterDecryptFailed)
        );
    }

    #[tokio::test]
    async fn unwrap_rejects_garbage_ciphertext() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();

        let envelope = Envelope {
            id: EventId::all_zeros(),
            sender: Keys::generate().public_key(),
            ciphertext: "definitely not nip44".to_string(),
            fallback_timestamp: Timestamp::now(),
        };

        assert_eq!(
            unwrap_envelope(&envelope, &local, &cipher).await,
            Err(RejectReason::OuterDecryptFailed)
        );
    }

    #[tokio::test]
    async fn unwrap_rejects_wrong_kind_seal() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();
        let one_time = Keys::generate();

        // Outer layer decrypts fine but contains a plain note, not a seal.
        let not_a_seal = EventBuilder::new(Kind::TextNote, "surprise")
            .sign_with_keys(&partner)
            .unwrap();
        let wrapped = cipher
            .encrypt(&one_time, &local.public_key(), &not_a_seal.as_json())
            .await
            .unwrap();
        let wrap = EventBuilder::new(Kind::GiftWrap, wrapped)
            .tag(Tag::public_key(local.public_key()))
            .sign_with_keys(&one_time)
            .unwrap();

        let envelope = envelope_from(&wrap);
        assert_eq!(
            unwrap_envelope(&envelope, &local, &cipher).await,
            Err(RejectReason::InvalidSeal)
        );
    }

    #[tokio::test]
    async fn unwrap_rejects_tampered_seal_signature() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();
        let one_time = Keys::generate();

        let sealed = cipher
            .encrypt(&partner, &local.public_key(), "{\"kind\":14}")
            .await
            .unwrap();
        let seal = EventBuilder::new(Kind::Seal, sealed)
            .sign_with_keys(&partner)
            .unwrap();

        // Graft a signature from an unrelated event onto the seal.
        let donor = EventBuilder::new(Kind::Seal, "other")
            .sign_with_keys(&partner)
            .unwrap();
        let mut forged: serde_json::Value = serde_json::from_str(&seal.as_json()).unwrap();
        forged["sig"] = serde_json::Value::String(donor.sig.to_string());

        let wrapped = cipher
            .encrypt(&one_time, &local.public_key(), &forged.to_string())
            .await
            .unwrap();
        let wrap = EventBuilder::new(Kind::GiftWrap, wrapped)
            .tag(Tag::public_key(local.public_key()))
            .sign_with_keys(&one_time)
            .unwrap();

        let envelope = envelope_from(&wrap);
        assert_eq!(
            unwrap_envelope(&envelope, &local, &cipher).await,
            Err(RejectReason::InvalidSeal)
        );
    }

    #[tokio::test]
    async fn unwrap_rejects_undecryptable_seal_content() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();
        let one_time = Keys::generate();

        let seal = EventBuilder::new(Kind::Seal, "garbage inner ciphertext")
            .sign_with_keys(&partner)
            .unwrap();
        let wrapped = cipher
            .encrypt(&one_time, &local.public_key(), &seal.as_json())
            .await
            .unwrap();
        let wrap = EventBuilder::new(Kind::GiftWrap, wrapped)
            .tag(Tag::public_key(local.public_key()))
            .sign_with_keys(&one_time)
            .unwrap();

        let envelope = envelope_from(&wrap);
        assert_eq!(
            unwrap_envelope(&envelope, &local, &cipher).await,
            Err(RejectReason::InnerDecryptFailed)
        );
    }

    async fn wrap_raw_rumor(
        rumor_json: &str,
        seal_author: &Keys,
        local: &Keys,
        cipher: &Nip44Cipher,
    ) -> Event {
        let sealed = cipher
            .encrypt(seal_author, &local.public_key(), rumor_json)
            .await
            .unwrap();
        let seal = EventBuilder::new(Kind::Seal, sealed)
            .sign_with_keys(seal_author)
            .unwrap();
        let one_time = Keys::generate();
        let wrapped = cipher
            .encrypt(&one_time, &local.public_key(), &seal.as_json())
            .await
            .unwrap();
        EventBuilder::new(Kind::GiftWrap, wrapped)
            .tag(Tag::public_key(local.public_key()))
            .sign_with_keys(&one_time)
            .unwrap()
    }

    #[tokio::test]
    async fn unwrap_rejects_wrong_kind_rumor() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();

        let rumor_json = format!(
            r#"{{"kind":1,"pubkey":"{}","content":"note","tags":[],"created_at":1700000000}}"#,
            partner.public_key().to_hex()
        );
        let wrap = wrap_raw_rumor(&rumor_json, &partner, &local, &cipher).await;

        let envelope = envelope_from(&wrap);
        assert_eq!(
            unwrap_envelope(&envelope, &local, &cipher).await,
            Err(RejectReason::InvalidRumor)
        );
    }

    #[tokio::test]
    async fn unwrap_rejects_author_mismatch() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();
        let eve = Keys::generate();

        // Seal signed by partner, rumor claims eve wrote it.
        let rumor_json = format!(
            r#"{{"kind":14,"pubkey":"{}","content":"forged","tags":[],"created_at":1700000000}}"#,
            eve.public_key().to_hex()
        );
        let wrap = wrap_raw_rumor(&rumor_json, &partner, &local, &cipher).await;

        let envelope = envelope_from(&wrap);
        assert_eq!(
            unwrap_envelope(&envelope, &local, &cipher).await,
            Err(RejectReason::InvalidRumor)
        );
    }

    #[tokio::test]
    async fn unwrap_rejects_self_addressed() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();

        let wraps = build_gift_wraps(
            &local,
            local.public_key(),
            "note to self",
            Timestamp::now(),
            &cipher,
        )
        .await
        .unwrap();

        let envelope = envelope_from(&wraps.to_partner);
        assert_eq!(
            unwrap_envelope(&envelope, &local, &cipher).await,
            Err(RejectReason::SelfAddressed)
        );
    }

    #[tokio::test]
    async fn missing_created_at_uses_envelope_fallback() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();

        let rumor_json = format!(
            r#"{{"kind":14,"pubkey":"{}","content":"undated","tags":[]}}"#,
            partner.public_key().to_hex()
        );
        let wrap = wrap_raw_rumor(&rumor_json, &partner, &local, &cipher).await;

        let mut envelope = envelope_from(&wrap);
        envelope.fallback_timestamp = Timestamp::from(4242);

        let rumor = unwrap_envelope(&envelope, &local, &cipher).await.unwrap();
        assert_eq!(rumor.created_at, Timestamp::from(4242));
    }

    #[tokio::test]
    async fn outgoing_wraps_are_signed_by_one_time_keys() {
        let cipher = Nip44Cipher;
        let local = Keys::generate();
        let partner = Keys::generate();

        let wraps = build_gift_wraps(&local, partner.public_key(), "hi", Timestamp::now(), &cipher)
            .await
            .unwrap();

        assert_ne!(wraps.to_partner.pubkey, local.public_key());
        assert_ne!(wraps.to_self.pubkey, local.public_key());
        assert_ne!(wraps.to_partner.pubkey, wraps.to_self.pubkey);
        assert!(wraps.to_partner.verify().is_ok());
        assert!(wraps.to_self.verify().is_ok());
    }
}
