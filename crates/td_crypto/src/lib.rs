//! td_crypto — Tandem cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Public APIs return opaque newtypes to prevent accidental misuse.
//!
//! # Module layout
//! - `keys`     — device X25519 keypair + public-key newtype + fingerprints
//! - `exchange` — Diffie-Hellman + HKDF derivation of the couple key
//! - `aead`     — XChaCha20-Poly1305 encrypt/decrypt helpers
//! - `kdf`      — HKDF-SHA256 expansion
//! - `error`    — unified error type

pub mod aead;
pub mod error;
pub mod exchange;
pub mod kdf;
pub mod keys;

pub use error::CryptoError;
pub use exchange::{derive_couple_key, CoupleKey};
pub use keys::{DeviceKeypair, DevicePublicKey};

/// Length in bytes of every key this crate deals in: X25519 public and
/// secret keys, and the derived couple symmetric key.
pub const KEY_LEN: usize = 32;
