//! td_pairing — couple pairing handshake and the encrypted couple channel
//!
//! This crate orchestrates what the primitives in `td_crypto` / `td_proto` /
//! `td_store` provide:
//!
//! - `handshake` — the two-phase cross-device pairing flow: the inviter
//!   renders a QR payload and polls for the partner's public key; the
//!   scanner consumes the payload and derives immediately
//! - `channel`   — encrypt-before-write / decrypt-after-read for every
//!   couple-shared record, with legacy plaintext passthrough and a
//!   first-class "locked" outcome
//! - `backend`   — capability traits over the sync backend (a dumb relay
//!   for public keys and opaque blobs), plus offline and in-memory impls
//! - `gate`      — the externally-supplied premium/sync/session predicate
//! - `error`     — unified error type

pub mod backend;
pub mod channel;
pub mod error;
pub mod gate;
pub mod handshake;

pub use backend::{EncryptedBlobStore, MemoryBackend, OfflineBackend, PairingDirectory};
pub use channel::{CoupleChannel, DecryptOutcome, LockedReason};
pub use error::PairingError;
pub use gate::{AlwaysAllowed, SyncGate};
pub use handshake::{Handshake, PairingStatus, PollConfig};
