//! Encrypted record envelope — what the backend sees at rest.
//!
//! The backend is a DUMB RELAY for couple-shared data: under each
//! `(coupleId, logicalKey)` slot it stores either this envelope (JSON) or,
//! for records written before encryption shipped, the original plaintext
//! value. The `alg` marker is how the read path tells the two apart, so the
//! marker string is part of the wire contract and must never change for v1.
//!
//! The envelope does NOT embed the couple id — the caller supplies it when
//! decrypting, and it is bound into the AEAD associated data instead.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use td_crypto::CryptoError;

/// Algorithm marker for v1 envelopes.
pub const ENVELOPE_ALG: &str = "xchacha20poly1305";

/// At-rest form of one encrypted couple-shared item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// Envelope format version, for future migrations.
    pub v: u8,

    /// AEAD algorithm marker — doubles as the "this is ciphertext" flag
    /// that distinguishes envelopes from legacy plaintext records.
    pub alg: String,

    /// base64url( nonce (24 bytes) || ciphertext + tag )
    pub ciphertext: String,
}

impl EncryptedEnvelope {
    /// Wrap raw AEAD output (nonce-prefixed wire bytes) for storage.
    pub fn from_wire_bytes(bytes: &[u8]) -> Self {
        Self {
            v: 1,
            alg: ENVELOPE_ALG.to_string(),
            ciphertext: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// Decode the nonce-prefixed wire bytes back out.
    pub fn wire_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(URL_SAFE_NO_PAD.decode(&self.ciphertext)?)
    }

    /// Does this stored value look like an envelope (as opposed to a legacy
    /// plaintext record)? Checks only the marker shape — a malformed
    /// envelope still answers `true` here and fails later, at decryption,
    /// as a locked record rather than silently passing through as
    /// plaintext.
    pub fn is_envelope(value: &Value) -> bool {
        value
            .as_object()
            .map(|obj| obj.contains_key("alg") && obj.contains_key("ciphertext"))
            .unwrap_or(false)
    }

    /// Parse a stored JSON value as an envelope. `None` if the shape or
    /// algorithm marker does not match v1.
    pub fn from_value(value: &Value) -> Option<Self> {
        let env: Self = serde_json::from_value(value.clone()).ok()?;
        if env.alg == ENVELOPE_ALG {
            Some(env)
        } else {
            None
        }
    }

    /// JSON form for storage under a backend slot.
    pub fn to_value(&self) -> Value {
        // Struct of two strings and a u8 — serialisation cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
