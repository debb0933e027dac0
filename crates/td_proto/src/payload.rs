//! Handshake payload codec — the validation boundary for pairing input.
//!
//! Wire format (UTF-8 JSON, rendered into a QR code or returned from an
//! invite-code redemption):
//!
//! ```json
//! { "coupleId": "<opaque string>", "publicKey": "<base64url, 32 bytes>" }
//! ```
//!
//! Everything arriving here came from a camera scan or a typed code and is
//! treated as adversarial: `decode_payload` never panics, and rejects the
//! input before any cryptographic operation can see it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use td_crypto::DevicePublicKey;

/// Why an incoming handshake payload was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is not valid JSON")]
    MalformedJson,

    #[error("payload is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("public key does not decode to exactly 32 bytes")]
    InvalidKeyLength,
}

/// The transient handshake DTO. Constructed for one transmission, consumed
/// once by the partner device, then discarded — never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingPayload {
    pub couple_id: String,
    pub public_key: DevicePublicKey,
}

#[derive(Serialize)]
struct WirePayload<'a> {
    #[serde(rename = "coupleId")]
    couple_id: &'a str,
    #[serde(rename = "publicKey")]
    public_key: String,
}

/// Produce the compact JSON string embedded in the QR code.
pub fn encode_payload(couple_id: &str, public_key: &DevicePublicKey) -> String {
    // Serialising two strings cannot fail.
    serde_json::to_string(&WirePayload {
        couple_id,
        public_key: public_key.to_b64(),
    })
    .unwrap_or_default()
}

/// Parse and validate a raw scanned/entered payload.
///
/// Unknown JSON keys are ignored. An empty `coupleId` counts as missing —
/// the backend never allocates empty identifiers.
pub fn decode_payload(raw: &str) -> Result<PairingPayload, PayloadError> {
    #[derive(Deserialize)]
    struct Incoming {
        #[serde(rename = "coupleId")]
        couple_id: Option<String>,
        #[serde(rename = "publicKey")]
        public_key: Option<String>,
    }

    let incoming: Incoming =
        serde_json::from_str(raw).map_err(|_| PayloadError::MalformedJson)?;

    let couple_id = match incoming.couple_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(PayloadError::MissingField("coupleId")),
    };
    let key_b64 = incoming
        .public_key
        .ok_or(PayloadError::MissingField("publicKey"))?;

    let public_key =
        DevicePublicKey::from_b64(&key_b64).map_err(|_| PayloadError::InvalidKeyLength)?;

    Ok(PairingPayload {
        couple_id,
        public_key,
    })
}
