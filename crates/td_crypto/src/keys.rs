//! Device key management
//!
//! Each app install owns one long-lived X25519 keypair, created lazily on
//! the first pairing attempt and never rotated. Only the public half ever
//! leaves the device (base64url on the wire, QR-embedded during pairing).
//! The secret half participates exclusively in Diffie-Hellman derivation
//! of the couple key (`exchange` module).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::{error::CryptoError, KEY_LEN};

// ── Public key newtype ────────────────────────────────────────────────────────

/// 32-byte X25519 public key, base64url-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DevicePublicKey(pub [u8; 32]);

impl DevicePublicKey {
    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Decode from base64url. Rejects anything that is not exactly 32 bytes
    /// — validation happens here, before any DH operation can run.
    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidPeerKey(format!(
                "public key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Human-readable fingerprint: BLAKE3 of the public key, truncated to
    /// 16 bytes, hex-encoded in groups of 4 for display. Partners compare
    /// these in person to confirm they paired with the right device.
    ///
    /// Example: "a1b2 c3d4 e5f6 7890 abcd ef01 2345 6789"
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(&self.0);
        let hex = hex::encode(&hash.as_bytes()[..16]);
        hex.as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ── Device keypair ────────────────────────────────────────────────────────────

/// The device's long-lived X25519 keypair. The secret half zeroizes on
/// drop (`x25519-dalek` with the `zeroize` feature).
///
/// The secret key is reachable only through the crate-private accessor the
/// derivation code uses — it must never appear on any networked code path.
pub struct DeviceKeypair {
    public: DevicePublicKey,
    secret: StaticSecret,
}

impl DeviceKeypair {
    /// Generate a fresh keypair from the OS random source.
    pub fn generate() -> Self {
        Self::generate_from_rng(&mut OsRng)
    }

    /// Generate from an injected RNG — lets tests be deterministic.
    pub fn generate_from_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = DevicePublicKey(*X25519Public::from(&secret).as_bytes());
        Self { public, secret }
    }

    /// Rebuild a keypair from stored secret bytes (secure-storage load path).
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::KeyGeneration(format!(
                "secret key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        let secret = StaticSecret::from(arr);
        let public = DevicePublicKey(*X25519Public::from(&secret).as_bytes());
        Ok(Self { public, secret })
    }

    pub fn public(&self) -> &DevicePublicKey {
        &self.public
    }

    /// Export the public key in base64 for QR / backend upload.
    pub fn public_b64(&self) -> String {
        self.public.to_b64()
    }

    /// Raw secret bytes for secure-storage persistence. Callers must hand
    /// these straight to the secure store and nowhere else.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_b64_roundtrip() {
        let kp = DeviceKeypair::generate();
        let b64 = kp.public_b64();
        let back = DevicePublicKey::from_b64(&b64).unwrap();
        assert_eq!(&back, kp.public());
    }

    #[test]
    fn rejects_short_public_key() {
        let err = DevicePublicKey::from_bytes(&[0u8; 16]);
        assert!(matches!(err, Err(CryptoError::InvalidPeerKey(_))));
    }

    #[test]
    fn rejects_garbage_b64() {
        assert!(DevicePublicKey::from_b64("!!not base64!!").is_err());
    }

    #[test]
    fn keypair_survives_secret_roundtrip() {
        let kp = DeviceKeypair::generate();
        let restored = DeviceKeypair::from_secret_bytes(&kp.secret_bytes()).unwrap();
        assert_eq!(restored.public(), kp.public());
    }

    #[test]
    fn fingerprint_is_stable_and_grouped() {
        let kp = DeviceKeypair::generate();
        let fp = kp.public().fingerprint();
        assert_eq!(fp, kp.public().fingerprint());
        assert_eq!(fp.split(' ').count(), 8);
    }
}
