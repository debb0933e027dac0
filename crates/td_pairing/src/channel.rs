//! The encrypted couple channel.
//!
//! Every couple-shared record (a note, a memory, a mood signal) passes
//! through here: JSON in, envelope out on writes; stored value in, tagged
//! outcome out on reads. The read path never throws for bad records —
//! legacy unencrypted rows, mid-migration rows, and tampered rows all
//! coexist in the same backend table, and one bad row must not brick the
//! whole read path. Callers get an explicit [`DecryptOutcome`] and decide
//! how to render each state.
//!
//! Associated data binds `couple_id` and the logical record slot into the
//! AEAD tag, so a valid ciphertext cannot be replayed under a different
//! couple or a different slot.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use td_crypto::aead;
use td_proto::EncryptedEnvelope;
use td_store::CoupleKeyRing;

use crate::{backend::EncryptedBlobStore, error::PairingError};

/// Result of reading one stored couple-shared value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// Envelope decrypted and authenticated.
    Decrypted(Value),
    /// The record predates encryption; returned unchanged.
    LegacyPlaintext(Value),
    /// The record cannot be read on this device. Render as "locked", never
    /// as an app-level failure.
    Locked(LockedReason),
}

/// Why a record is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockedReason {
    /// No couple key derived yet on this device.
    NoKey,
    /// Authentication failed: wrong key, tampering, or corruption. Only a
    /// re-pair (or a correctly-keyed device re-syncing the record) can
    /// recover it.
    AuthenticationFailed,
    /// The envelope itself does not parse (bad base64, wrong version).
    Malformed,
}

/// Encrypt-before-write / decrypt-after-read over the per-couple key.
pub struct CoupleChannel {
    ring: Arc<CoupleKeyRing>,
}

impl CoupleChannel {
    pub fn new(ring: Arc<CoupleKeyRing>) -> Self {
        Self { ring }
    }

    /// Encrypt a JSON payload for the couple, binding `context` (the
    /// logical record slot, e.g. `"note:2026-08-27"`) as associated data.
    ///
    /// Does NOT trigger derivation — fails with
    /// [`PairingError::KeyNotAvailable`] until pairing completes, which
    /// callers surface as "waiting for partner".
    pub fn encrypt(
        &self,
        couple_id: &str,
        plaintext: &Value,
        context: &str,
    ) -> Result<EncryptedEnvelope, PairingError> {
        let Some(stored) = self.ring.get(couple_id)? else {
            return Err(PairingError::KeyNotAvailable {
                couple_id: couple_id.to_string(),
            });
        };

        let bytes = serde_json::to_vec(plaintext)
            .map_err(|e| PairingError::Crypto(td_crypto::CryptoError::Serialisation(e)))?;
        let wire = aead::seal(&stored.key, &bytes, &aad(couple_id, context))?;
        Ok(EncryptedEnvelope::from_wire_bytes(&wire))
    }

    /// Read one stored value: envelope → decrypt, anything else → legacy
    /// passthrough. `context` must match what the writer passed.
    pub fn decrypt(
        &self,
        couple_id: &str,
        stored: &Value,
        context: &str,
    ) -> Result<DecryptOutcome, PairingError> {
        if !EncryptedEnvelope::is_envelope(stored) {
            debug!(couple_id, context, "legacy plaintext record");
            return Ok(DecryptOutcome::LegacyPlaintext(stored.clone()));
        }

        let Some(envelope) = EncryptedEnvelope::from_value(stored) else {
            warn!(couple_id, context, "record looks encrypted but is not a v1 envelope");
            return Ok(DecryptOutcome::Locked(LockedReason::Malformed));
        };

        let Some(key) = self.ring.get(couple_id)? else {
            return Ok(DecryptOutcome::Locked(LockedReason::NoKey));
        };

        let wire = match envelope.wire_bytes() {
            Ok(bytes) => bytes,
            Err(_) => return Ok(DecryptOutcome::Locked(LockedReason::Malformed)),
        };

        match aead::open(&key.key, &wire, &aad(couple_id, context)) {
            Ok(plaintext) => match serde_json::from_slice(&plaintext) {
                Ok(value) => Ok(DecryptOutcome::Decrypted(value)),
                Err(_) => Ok(DecryptOutcome::Locked(LockedReason::Malformed)),
            },
            Err(_) => {
                warn!(couple_id, context, "record failed authentication; locked");
                Ok(DecryptOutcome::Locked(LockedReason::AuthenticationFailed))
            }
        }
    }

    /// Encrypt and write through to the backend slot. The logical key is
    /// the AEAD context, so a blob moved to another slot stops decrypting.
    pub async fn put_encrypted(
        &self,
        blobs: &dyn EncryptedBlobStore,
        couple_id: &str,
        logical_key: &str,
        plaintext: &Value,
    ) -> Result<(), PairingError> {
        let envelope = self.encrypt(couple_id, plaintext, logical_key)?;
        blobs.put(couple_id, logical_key, &envelope.to_value()).await
    }

    /// Fetch and decrypt one backend slot. `Ok(None)` if the slot was never
    /// written.
    pub async fn get_decrypted(
        &self,
        blobs: &dyn EncryptedBlobStore,
        couple_id: &str,
        logical_key: &str,
    ) -> Result<Option<DecryptOutcome>, PairingError> {
        match blobs.get(couple_id, logical_key).await? {
            Some(stored) => Ok(Some(self.decrypt(couple_id, &stored, logical_key)?)),
            None => Ok(None),
        }
    }
}

fn aad(couple_id: &str, context: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(couple_id.len() + 1 + context.len());
    out.extend_from_slice(couple_id.as_bytes());
    out.push(0);
    out.extend_from_slice(context.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use td_crypto::CoupleKey;
    use td_store::MemoryStore;

    fn channel_with_key(couple_id: &str, key: [u8; 32]) -> (CoupleChannel, Arc<CoupleKeyRing>) {
        let ring = Arc::new(CoupleKeyRing::new(Arc::new(MemoryStore::new())));
        ring.store(couple_id, &CoupleKey::from_bytes(key)).unwrap();
        (CoupleChannel::new(Arc::clone(&ring)), ring)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let (channel, _) = channel_with_key("c1", [5u8; 32]);
        let note = json!({"note": "hi", "mood": "sunny"});

        let envelope = channel.encrypt("c1", &note, "note:today").unwrap();
        let outcome = channel
            .decrypt("c1", &envelope.to_value(), "note:today")
            .unwrap();
        assert_eq!(outcome, DecryptOutcome::Decrypted(note));
    }

    #[test]
    fn same_plaintext_never_yields_same_ciphertext() {
        let (channel, _) = channel_with_key("c1", [5u8; 32]);
        let note = json!({"note": "hi"});
        let a = channel.encrypt("c1", &note, "ctx").unwrap();
        let b = channel.encrypt("c1", &note, "ctx").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn encrypt_without_key_is_key_not_available() {
        let ring = Arc::new(CoupleKeyRing::new(Arc::new(MemoryStore::new())));
        let channel = CoupleChannel::new(ring);
        let err = channel.encrypt("c1", &json!({}), "ctx");
        assert!(matches!(
            err,
            Err(PairingError::KeyNotAvailable { couple_id }) if couple_id == "c1"
        ));
    }

    #[test]
    fn decrypt_without_key_is_locked_not_error() {
        let (channel, ring) = channel_with_key("c1", [5u8; 32]);
        let envelope = channel.encrypt("c1", &json!({"x": 1}), "ctx").unwrap();

        ring.remove("c1").unwrap();
        let outcome = channel.decrypt("c1", &envelope.to_value(), "ctx").unwrap();
        assert_eq!(outcome, DecryptOutcome::Locked(LockedReason::NoKey));
    }

    #[test]
    fn legacy_plaintext_passes_through_unchanged() {
        let (channel, _) = channel_with_key("c1", [5u8; 32]);
        let legacy = json!({"note": "written before encryption"});
        let outcome = channel.decrypt("c1", &legacy, "ctx").unwrap();
        assert_eq!(outcome, DecryptOutcome::LegacyPlaintext(legacy));

        let legacy_string = json!("a bare string value");
        let outcome = channel.decrypt("c1", &legacy_string, "ctx").unwrap();
        assert_eq!(outcome, DecryptOutcome::LegacyPlaintext(legacy_string));
    }

    #[test]
    fn tampered_ciphertext_is_locked() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let (channel, _) = channel_with_key("c1", [5u8; 32]);
        let envelope = channel.encrypt("c1", &json!({"x": 1}), "ctx").unwrap();

        let mut wire = URL_SAFE_NO_PAD.decode(&envelope.ciphertext).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        let tampered = json!({
            "v": 1,
            "alg": td_proto::ENVELOPE_ALG,
            "ciphertext": URL_SAFE_NO_PAD.encode(&wire),
        });

        let outcome = channel.decrypt("c1", &tampered, "ctx").unwrap();
        assert_eq!(
            outcome,
            DecryptOutcome::Locked(LockedReason::AuthenticationFailed)
        );
    }

    #[test]
    fn context_mismatch_is_locked() {
        let (channel, _) = channel_with_key("c1", [5u8; 32]);
        let envelope = channel.encrypt("c1", &json!({"x": 1}), "slot-a").unwrap();
        let outcome = channel
            .decrypt("c1", &envelope.to_value(), "slot-b")
            .unwrap();
        assert_eq!(
            outcome,
            DecryptOutcome::Locked(LockedReason::AuthenticationFailed)
        );
    }

    #[test]
    fn wrong_couple_key_is_locked() {
        let (alice_channel, _) = channel_with_key("c1", [5u8; 32]);
        let (other_channel, _) = channel_with_key("c1", [6u8; 32]);

        let envelope = alice_channel.encrypt("c1", &json!({"x": 1}), "ctx").unwrap();
        let outcome = other_channel
            .decrypt("c1", &envelope.to_value(), "ctx")
            .unwrap();
        assert_eq!(
            outcome,
            DecryptOutcome::Locked(LockedReason::AuthenticationFailed)
        );
    }

    #[test]
    fn unparseable_envelope_is_locked_malformed() {
        let (channel, _) = channel_with_key("c1", [5u8; 32]);
        let bad = json!({"v": 1, "alg": td_proto::ENVELOPE_ALG, "ciphertext": "!!!"});
        let outcome = channel.decrypt("c1", &bad, "ctx").unwrap();
        assert_eq!(outcome, DecryptOutcome::Locked(LockedReason::Malformed));
    }

    #[tokio::test]
    async fn write_through_and_read_through_the_backend() {
        use crate::backend::{EncryptedBlobStore as _, MemoryBackend};

        let backend = MemoryBackend::new();
        let (channel, _) = channel_with_key("c1", [5u8; 32]);
        let note = json!({"note": "hi"});

        channel
            .put_encrypted(&backend, "c1", "note:today", &note)
            .await
            .unwrap();

        // At rest it is an envelope, not plaintext.
        let at_rest = backend.get("c1", "note:today").await.unwrap().unwrap();
        assert!(td_proto::EncryptedEnvelope::is_envelope(&at_rest));

        let outcome = channel
            .get_decrypted(&backend, "c1", "note:today")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, DecryptOutcome::Decrypted(note));

        assert!(channel
            .get_decrypted(&backend, "c1", "never-written")
            .await
            .unwrap()
            .is_none());
    }
}
