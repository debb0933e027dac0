//! Authenticated Encryption with Associated Data
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce).
//! Key size: 32 bytes.  Nonce: 24 bytes (random, fresh per call).  Tag: 16 bytes.
//!
//! Ciphertext wire format:
//!   [ nonce (24 bytes) | ciphertext + tag ]
//!
//! The 24-byte random nonce makes accidental nonce reuse a non-issue at any
//! realistic message volume, which is why no counter state is kept.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
    XChaCha20Poly1305,
};
use zeroize::Zeroizing;

use crate::{error::CryptoError, exchange::CoupleKey};

const NONCE_LEN: usize = 24;

/// Encrypt `plaintext` under the couple key, prepending a fresh random
/// 24-byte nonce. `aad` — associated data, authenticated but not encrypted
/// (the channel binds the logical record slot here so ciphertexts cannot be
/// replayed under a different slot).
pub fn seal(key: &CoupleKey, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher =
        XChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::AeadEncrypt)?;

    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            chacha20poly1305::aead::Payload { msg: plaintext, aad },
        )
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt wire-format bytes (nonce || ciphertext+tag).
///
/// Any tampering, truncation, or wrong key fails the Poly1305 tag check and
/// surfaces as `AeadDecrypt` — there is no partially-decrypted output.
pub fn open(key: &CoupleKey, data: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if data.len() < NONCE_LEN {
        return Err(CryptoError::AeadDecrypt);
    }
    let (nonce_bytes, ct) = data.split_at(NONCE_LEN);
    let nonce = chacha20poly1305::XNonce::from_slice(nonce_bytes);

    let cipher =
        XChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::AeadDecrypt)?;

    let plaintext = cipher
        .decrypt(nonce, chacha20poly1305::aead::Payload { msg: ct, aad })
        .map_err(|_| CryptoError::AeadDecrypt)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CoupleKey {
        CoupleKey::from_bytes([7u8; 32])
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = test_key();
        let ct = seal(&key, b"{\"note\":\"hi\"}", b"ctx").unwrap();
        let pt = open(&key, &ct, b"ctx").unwrap();
        assert_eq!(&pt[..], b"{\"note\":\"hi\"}");
    }

    #[test]
    fn fresh_nonce_every_call() {
        let key = test_key();
        let a = seal(&key, b"same plaintext", b"").unwrap();
        let b = seal(&key, b"same plaintext", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn any_single_bit_flip_is_detected() {
        let key = test_key();
        let ct = seal(&key, b"love note", b"").unwrap();
        for byte in 0..ct.len() {
            let mut tampered = ct.clone();
            tampered[byte] ^= 0x01;
            assert!(
                open(&key, &tampered, b"").is_err(),
                "bit flip at byte {byte} was not detected"
            );
        }
    }

    #[test]
    fn wrong_aad_fails_authentication() {
        let key = test_key();
        let ct = seal(&key, b"payload", b"slot-a").unwrap();
        assert!(open(&key, &ct, b"slot-b").is_err());
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let ct = seal(&test_key(), b"payload", b"").unwrap();
        let other = CoupleKey::from_bytes([8u8; 32]);
        assert!(open(&other, &ct, b"").is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        let key = test_key();
        assert!(open(&key, &[0u8; 10], b"").is_err());
    }
}
