//! Couple key agreement.
//!
//! References:
//!   - RFC 7748 (X25519): <https://datatracker.ietf.org/doc/html/rfc7748>
//!   - RFC 5869 (HKDF):  <https://datatracker.ietf.org/doc/html/rfc5869>
//!
//! Protocol:
//!   Each device holds a long-lived X25519 keypair. During pairing the two
//!   devices exchange public keys (QR code outbound, backend relay inbound)
//!   and each independently computes
//!
//!   ```text
//!   K = HKDF-SHA256(salt = "td-couple-v1",
//!                   ikm  = DH(my_secret, peer_public),
//!                   info = "td-couple-key-v1")
//!   ```
//!
//!   DH is commutative, so both sides arrive at the identical 32-byte K.
//!   Every couple-shared record is then AEAD-encrypted under K.
//!
//! Non-negotiable:
//!   - The raw DH output is never used as an encryption key; it always
//!     passes through HKDF with the fixed context above.
//!   - A non-contributory DH result (low-order peer point, all-zero shared
//!     secret) is rejected before any key material is produced.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    error::CryptoError,
    kdf,
    keys::{DeviceKeypair, DevicePublicKey},
};

const COUPLE_KEY_SALT: &[u8] = b"td-couple-v1";
const COUPLE_KEY_INFO: &[u8] = b"td-couple-key-v1";

/// The 32-byte symmetric key both partners share. Zeroized on drop; never
/// serialized to the network in any form.
#[derive(Clone, ZeroizeOnDrop)]
pub struct CoupleKey(pub(crate) [u8; 32]);

impl CoupleKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// Deliberately opaque: key material must not end up in logs via {:?}.
impl std::fmt::Debug for CoupleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CoupleKey(..)")
    }
}

/// Compute the shared couple key from our keypair and the partner's public
/// key. Run independently on both devices; produces bit-identical output on
/// each (the correctness property the whole pairing protocol rests on).
pub fn derive_couple_key(
    local: &DeviceKeypair,
    peer: &DevicePublicKey,
) -> Result<CoupleKey, CryptoError> {
    let peer_point = x25519_dalek::PublicKey::from(*peer.as_bytes());
    let shared = local.secret().diffie_hellman(&peer_point);

    if !shared.was_contributory() {
        return Err(CryptoError::InvalidPeerKey(
            "peer key produced a non-contributory shared secret".into(),
        ));
    }

    let mut key = [0u8; 32];
    kdf::hkdf_expand(
        shared.as_bytes(),
        Some(COUPLE_KEY_SALT),
        COUPLE_KEY_INFO,
        &mut key,
    )?;

    let out = CoupleKey(key);
    key.zeroize();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_commutative() {
        // derive(A_sec, B_pub) == derive(B_sec, A_pub) for random keypairs.
        for _ in 0..16 {
            let a = DeviceKeypair::generate();
            let b = DeviceKeypair::generate();
            let k_a = derive_couple_key(&a, b.public()).unwrap();
            let k_b = derive_couple_key(&b, a.public()).unwrap();
            assert_eq!(k_a.as_bytes(), k_b.as_bytes());
        }
    }

    #[test]
    fn different_peers_give_different_keys() {
        let a = DeviceKeypair::generate();
        let b = DeviceKeypair::generate();
        let c = DeviceKeypair::generate();
        let k_ab = derive_couple_key(&a, b.public()).unwrap();
        let k_ac = derive_couple_key(&a, c.public()).unwrap();
        assert_ne!(k_ab.as_bytes(), k_ac.as_bytes());
    }

    #[test]
    fn derived_key_differs_from_raw_dh_output() {
        let a = DeviceKeypair::generate();
        let b = DeviceKeypair::generate();
        let peer_point = x25519_dalek::PublicKey::from(*b.public().as_bytes());
        let raw = a.secret().diffie_hellman(&peer_point);
        let k = derive_couple_key(&a, b.public()).unwrap();
        assert_ne!(k.as_bytes(), raw.as_bytes());
    }

    #[test]
    fn rejects_low_order_peer_point() {
        let a = DeviceKeypair::generate();
        // The identity point: DH with it yields an all-zero shared secret.
        let low_order = DevicePublicKey([0u8; 32]);
        let err = derive_couple_key(&a, &low_order);
        assert!(matches!(err, Err(CryptoError::InvalidPeerKey(_))));
    }
}
